use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::model::{Edge, Node};

use super::config::{LayoutConfig, LayoutError};
use super::simulation::Simulation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Finish,
}

type FrameCallback = Rc<RefCell<Box<dyn FnMut() -> FrameControl>>>;

#[derive(Default)]
struct Callbacks {
    next_id: u64,
    entries: BTreeMap<u64, FrameCallback>,
}

/// Single-threaded frame scheduler. The host calls [`FrameLoop::run_frame`] once per
/// repaint; every registered callback runs once per frame until it finishes or is cancelled.
#[derive(Clone, Default)]
pub struct FrameLoop {
    callbacks: Rc<RefCell<Callbacks>>,
}

pub struct FrameHandle {
    id: u64,
    owner: Weak<RefCell<Callbacks>>,
}

impl FrameHandle {
    pub fn cancel(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|callbacks| callbacks.borrow_mut().entries.remove(&self.id).is_some())
    }

    pub fn is_scheduled(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|callbacks| callbacks.borrow().entries.contains_key(&self.id))
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, callback: impl FnMut() -> FrameControl + 'static) -> FrameHandle {
        let mut callbacks = self.callbacks.borrow_mut();
        let id = callbacks.next_id;
        callbacks.next_id += 1;
        callbacks
            .entries
            .insert(id, Rc::new(RefCell::new(Box::new(callback))));
        FrameHandle {
            id,
            owner: Rc::downgrade(&self.callbacks),
        }
    }

    pub fn run_frame(&self) -> usize {
        let snapshot = self
            .callbacks
            .borrow()
            .entries
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect::<Vec<_>>();

        let mut ran = 0;
        for (id, callback) in snapshot {
            if !self.callbacks.borrow().entries.contains_key(&id) {
                continue;
            }
            let control = (callback.borrow_mut())();
            ran += 1;
            if control == FrameControl::Finish {
                self.callbacks.borrow_mut().entries.remove(&id);
            }
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.callbacks.borrow().entries.len()
    }
}

type TickObserver = Rc<RefCell<Box<dyn FnMut(&Simulation)>>>;

/// A simulation advancing one tick per frame. Dropping the handle stops it.
pub struct LiveSimulation {
    state: Rc<RefCell<Simulation>>,
    on_tick: TickObserver,
    frames: FrameLoop,
    handle: Option<FrameHandle>,
}

pub fn create_live_simulation(
    nodes: Vec<Node>,
    edges: &[Edge],
    config: LayoutConfig,
    frames: &FrameLoop,
    on_tick: impl FnMut(&Simulation) + 'static,
) -> Result<LiveSimulation, LayoutError> {
    let simulation = Simulation::new(nodes, edges, config)?;
    info!(nodes = simulation.len(), "live layout started");

    let mut live = LiveSimulation {
        state: Rc::new(RefCell::new(simulation)),
        on_tick: Rc::new(RefCell::new(Box::new(on_tick))),
        frames: frames.clone(),
        handle: None,
    };
    live.schedule();
    Ok(live)
}

impl LiveSimulation {
    fn schedule(&mut self) {
        let state = Rc::clone(&self.state);
        let on_tick = Rc::clone(&self.on_tick);
        self.handle = Some(self.frames.request(move || {
            let mut simulation = state.borrow_mut();
            simulation.tick();
            (on_tick.borrow_mut())(&simulation);
            if simulation.is_settled() {
                debug!(alpha = simulation.alpha(), "live layout settled");
                FrameControl::Finish
            } else {
                FrameControl::Continue
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.cancel()
        {
            debug!("live layout stopped");
        }
    }

    pub fn restart(&mut self) {
        if self.is_running() {
            return;
        }
        self.stop();
        self.schedule();
    }

    pub fn reheat(&mut self) {
        {
            let mut simulation = self.state.borrow_mut();
            let target = simulation.config().reheat_alpha;
            if simulation.alpha() < target {
                simulation.set_alpha(target);
            }
        }
        self.restart();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(FrameHandle::is_scheduled)
    }

    pub fn replace_graph(&mut self, nodes: Vec<Node>, edges: &[Edge]) {
        self.state.borrow_mut().replace_graph(nodes, edges);
        self.reheat();
    }

    pub fn with_simulation<R>(&self, read: impl FnOnce(&Simulation) -> R) -> R {
        read(&self.state.borrow())
    }
}

impl Drop for LiveSimulation {
    fn drop(&mut self) {
        self.stop();
    }
}
