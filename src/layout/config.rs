use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("velocityDecay must be within (0, 1], got {0}")]
    VelocityDecay(f32),
    #[error("alphaDecay must be within [0, 1), got {0}")]
    AlphaDecay(f32),
    #[error("chargeStrength {charge} without a collision radius lets every node collapse onto one point")]
    Collapse { charge: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub charge_strength: f32,
    pub link_distance: f32,
    pub collision_multiplier: f32,
    pub collision_strength: f32,
    pub center_strength: f32,
    pub iterations: usize,
    pub velocity_decay: f32,
    pub alpha_min: f32,
    /// Derived from `iterations` and `alpha_min` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_decay: Option<f32>,
    pub reheat_alpha: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            charge_strength: -150.0,
            link_distance: 60.0,
            collision_multiplier: 2.0,
            collision_strength: 0.7,
            center_strength: 0.05,
            iterations: 300,
            velocity_decay: 0.4,
            alpha_min: 0.001,
            alpha_decay: None,
            reheat_alpha: 0.3,
        }
    }
}

impl LayoutConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read layout config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid layout config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("rejected layout config {}", path.display()))?;
        Ok(config)
    }

    pub fn centered_on_origin(self) -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            ..self
        }
    }

    pub fn decay_rate(&self) -> f32 {
        self.alpha_decay.unwrap_or_else(|| {
            // Reaches alpha_min after `iterations` ticks.
            1.0 - self.alpha_min.powf(1.0 / self.iterations.max(1) as f32)
        })
    }

    pub fn center(&self) -> Vec2 {
        vec2(self.width / 2.0, self.height / 2.0)
    }

    pub fn charge_for(&self, weight: f32) -> f32 {
        self.charge_strength * (1.0 + weight * 0.1)
    }

    pub fn collision_radius(&self, weight: f32) -> f32 {
        (weight + 1.0) * self.collision_multiplier
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let finite = [
            ("width", self.width),
            ("height", self.height),
            ("chargeStrength", self.charge_strength),
            ("linkDistance", self.link_distance),
            ("collisionMultiplier", self.collision_multiplier),
            ("collisionStrength", self.collision_strength),
            ("centerStrength", self.center_strength),
            ("velocityDecay", self.velocity_decay),
            ("alphaMin", self.alpha_min),
            ("alphaDecay", self.decay_rate()),
            ("reheatAlpha", self.reheat_alpha),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(LayoutError::NonFinite { field });
            }
        }

        let non_negative = [
            ("width", self.width),
            ("height", self.height),
            ("linkDistance", self.link_distance),
            ("collisionMultiplier", self.collision_multiplier),
            ("collisionStrength", self.collision_strength),
            ("centerStrength", self.center_strength),
            ("alphaMin", self.alpha_min),
            ("reheatAlpha", self.reheat_alpha),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(LayoutError::Negative { field });
            }
        }

        if self.velocity_decay <= 0.0 || self.velocity_decay > 1.0 {
            return Err(LayoutError::VelocityDecay(self.velocity_decay));
        }
        if !(0.0..1.0).contains(&self.decay_rate()) {
            return Err(LayoutError::AlphaDecay(self.decay_rate()));
        }
        if self.charge_strength >= 0.0 && self.collision_multiplier == 0.0 {
            return Err(LayoutError::Collapse {
                charge: self.charge_strength,
            });
        }
        Ok(())
    }
}
