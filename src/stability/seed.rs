use std::f64::consts::TAU;

use crate::model::Position;
use crate::util::{Lcg, stable_hash};

const BASE_RADIUS: f64 = 100.0;
const RING_SPACING: f64 = 80.0;
const RING_COUNT: u32 = 3;

pub fn seeded_position(id: &str) -> Position {
    let mut rng = Lcg::new(stable_hash(id));
    let angle = rng.next_unit() * TAU;
    let ring = rng.next_u32() % RING_COUNT;
    let radius = BASE_RADIUS + f64::from(ring) * RING_SPACING;
    Position::new(radius * angle.cos(), radius * angle.sin())
}
