//! Alpha-cooled velocity Verlet stepper.
//!
//! A [`Simulation`] owns its nodes and an ordered set of named forces. Each
//! tick cools `alpha` toward `alpha_target`, applies every force in
//! registration order and then integrates positions. While running it is
//! driven by a [`Timer`] on the injected [`Scheduler`] and stops itself once
//! `alpha` falls below `alpha_min`.

use std::cell::RefCell;
use std::f64::consts::PI;
use std::fmt;
use std::rc::{Rc, Weak};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatch::{Dispatch, Listener};
use crate::error::{DispatchError, LayoutError};
use crate::force::Force;
use crate::timer::{Scheduler, Timer};

const INITIAL_RADIUS: f64 = 10.0;

fn initial_angle() -> f64 {
    PI * (3.0 - 5f64.sqrt())
}

/// A simulated point. `payload` is whatever the caller wants to travel with
/// it; forces may read it through their accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<P = ()> {
    pub id: String,
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
    pub payload: P,
}

impl Node {
    /// Node without a position; the simulation places it on a spiral.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_payload(id, ())
    }

    pub fn at(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::new(id)
        }
    }
}

impl<P> Node<P> {
    /// Unplaced node carrying `payload`.
    pub fn with_payload(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            index: 0,
            x: f64::NAN,
            y: f64::NAN,
            vx: f64::NAN,
            vy: f64::NAN,
            fx: None,
            fy: None,
            payload,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub alpha: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub alpha_target: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            alpha: 1.0,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            alpha_target: 0.0,
            velocity_decay: 0.4,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationEvent {
    pub alpha: f64,
}

struct State<P> {
    nodes: Vec<Node<P>>,
    forces: Vec<(String, Box<dyn Force<P>>)>,
    alpha: f64,
    alpha_min: f64,
    alpha_decay: f64,
    alpha_target: f64,
    velocity_decay: f64,
    rng: StdRng,
}

impl<P> State<P> {
    fn tick(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;

            for (_, force) in &mut self.forces {
                force.apply(&mut self.nodes, self.alpha, &mut self.rng);
            }

            for node in &mut self.nodes {
                match node.fx {
                    Some(fx) => {
                        node.x = fx;
                        node.vx = 0.0;
                    }
                    None => {
                        node.vx *= self.velocity_decay;
                        node.x += node.vx;
                    }
                }
                match node.fy {
                    Some(fy) => {
                        node.y = fy;
                        node.vy = 0.0;
                    }
                    None => {
                        node.vy *= self.velocity_decay;
                        node.y += node.vy;
                    }
                }
            }
        }
    }

    fn initialize_nodes(&mut self) {
        let angle = initial_angle();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.index = i;
            if let Some(fx) = node.fx {
                node.x = fx;
            }
            if let Some(fy) = node.fy {
                node.y = fy;
            }
            if node.x.is_nan() || node.y.is_nan() {
                let radius = INITIAL_RADIUS * (i as f64).sqrt();
                let theta = i as f64 * angle;
                node.x = radius * theta.cos();
                node.y = radius * theta.sin();
            }
            if node.vx.is_nan() || node.vy.is_nan() {
                node.vx = 0.0;
                node.vy = 0.0;
            }
        }
    }

    fn initialize_forces(&mut self) -> Result<(), LayoutError> {
        for (_, force) in &mut self.forces {
            force.initialize(&self.nodes, &mut self.rng)?;
        }
        Ok(())
    }
}

struct Shared<P> {
    state: RefCell<State<P>>,
    events: RefCell<Dispatch<SimulationEvent>>,
}

impl<P> Shared<P> {
    fn emit(&self, kind: &str, event: SimulationEvent) {
        let events = self.events.borrow().copy();
        if let Err(error) = events.call(kind, &event) {
            debug!(%error, "simulation event not delivered");
        }
    }

    fn step(&self, stepper: &Timer) {
        let (alpha, cooled) = {
            let mut state = self.state.borrow_mut();
            state.tick(1);
            (state.alpha, state.alpha < state.alpha_min)
        };

        self.emit("tick", SimulationEvent { alpha });
        if cooled {
            stepper.stop();
            debug!(alpha, "simulation cooled down");
            self.emit("end", SimulationEvent { alpha });
        }
    }
}

/// Force simulation over a node set.
///
/// Dropping the simulation stops its stepper.
pub struct Simulation<P = ()> {
    shared: Rc<Shared<P>>,
    stepper: Timer,
}

impl<P: 'static> Simulation<P> {
    /// Creates a simulation with default parameters and starts stepping it.
    pub fn new(scheduler: &Scheduler, nodes: Vec<Node<P>>) -> Self {
        Self::with_config(scheduler, nodes, &SimulationConfig::default())
    }

    pub fn with_config(scheduler: &Scheduler, nodes: Vec<Node<P>>, config: &SimulationConfig) -> Self {
        let mut state = State {
            nodes,
            forces: Vec::new(),
            alpha: config.alpha,
            alpha_min: config.alpha_min,
            alpha_decay: config.alpha_decay,
            alpha_target: config.alpha_target,
            velocity_decay: 1.0 - config.velocity_decay,
            rng: StdRng::seed_from_u64(config.seed),
        };
        state.initialize_nodes();

        let shared = Rc::new(Shared {
            state: RefCell::new(state),
            events: RefCell::new(Dispatch::with_types(&["tick", "end"])),
        });
        let stepper = scheduler.timer(|_| {}, 0.0, None);
        let simulation = Self { shared, stepper };
        simulation.restart();
        simulation
    }

    fn step_callback(&self) -> impl FnMut(f64) + 'static {
        let shared: Weak<Shared<P>> = Rc::downgrade(&self.shared);
        let stepper = self.stepper.clone();
        move |_| match shared.upgrade() {
            Some(shared) => shared.step(&stepper),
            None => stepper.stop(),
        }
    }

    /// Resumes continuous stepping on the scheduler.
    pub fn restart(&self) -> &Self {
        self.stepper.restart(self.step_callback(), 0.0, None);
        self
    }

    /// Stops continuous stepping. Stopping twice is harmless.
    pub fn stop(&self) -> &Self {
        self.stepper.stop();
        self
    }

    pub fn is_running(&self) -> bool {
        self.stepper.is_active()
    }

    /// Runs `iterations` ticks synchronously. No events are emitted.
    pub fn tick(&self, iterations: usize) -> &Self {
        self.shared.state.borrow_mut().tick(iterations);
        self
    }

    /// Replaces the node set and re-initializes every force against it.
    ///
    /// If a force rejects the new nodes the previous set is put back and
    /// every force is re-initialized against it before the error is returned.
    pub fn set_nodes(&self, nodes: Vec<Node<P>>) -> Result<&Self, LayoutError> {
        let mut state = self.shared.state.borrow_mut();
        let previous = std::mem::replace(&mut state.nodes, nodes);
        state.initialize_nodes();
        if let Err(error) = state.initialize_forces() {
            state.nodes = previous;
            if let Err(restore) = state.initialize_forces() {
                debug!(%restore, "forces could not be restored to the previous nodes");
            }
            return Err(error);
        }
        Ok(self)
    }

    /// Registers `force` under `name`, replacing any force with that name in
    /// place. The force is initialized against the current nodes first.
    pub fn add_force(&self, name: &str, mut force: Box<dyn Force<P>>) -> Result<&Self, LayoutError> {
        let replaced = {
            let mut state = self.shared.state.borrow_mut();
            let state = &mut *state;
            force.initialize(&state.nodes, &mut state.rng)?;
            match state.forces.iter_mut().find(|(existing, _)| existing == name) {
                Some((_, slot)) => Some(std::mem::replace(slot, force)),
                None => {
                    state.forces.push((name.to_owned(), force));
                    None
                }
            }
        };
        debug!(name, replaced = replaced.is_some(), "force registered");
        drop(replaced);
        Ok(self)
    }

    pub fn remove_force(&self, name: &str) -> Option<Box<dyn Force<P>>> {
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            let position = state.forces.iter().position(|(existing, _)| existing == name)?;
            state.forces.remove(position).1
        };
        debug!(name, "force removed");
        Some(removed)
    }

    pub fn force_names(&self) -> Vec<String> {
        self.shared
            .state
            .borrow()
            .forces
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn alpha(&self) -> f64 {
        self.shared.state.borrow().alpha
    }

    pub fn set_alpha(&self, alpha: f64) -> &Self {
        self.shared.state.borrow_mut().alpha = alpha;
        self
    }

    pub fn alpha_min(&self) -> f64 {
        self.shared.state.borrow().alpha_min
    }

    pub fn set_alpha_min(&self, alpha_min: f64) -> &Self {
        self.shared.state.borrow_mut().alpha_min = alpha_min;
        self
    }

    pub fn alpha_decay(&self) -> f64 {
        self.shared.state.borrow().alpha_decay
    }

    pub fn set_alpha_decay(&self, alpha_decay: f64) -> &Self {
        self.shared.state.borrow_mut().alpha_decay = alpha_decay;
        self
    }

    pub fn alpha_target(&self) -> f64 {
        self.shared.state.borrow().alpha_target
    }

    pub fn set_alpha_target(&self, alpha_target: f64) -> &Self {
        self.shared.state.borrow_mut().alpha_target = alpha_target;
        self
    }

    pub fn velocity_decay(&self) -> f64 {
        1.0 - self.shared.state.borrow().velocity_decay
    }

    pub fn set_velocity_decay(&self, velocity_decay: f64) -> &Self {
        self.shared.state.borrow_mut().velocity_decay = 1.0 - velocity_decay;
        self
    }

    /// Index of the node closest to `(x, y)`, optionally within `radius`.
    pub fn find(&self, x: f64, y: f64, radius: Option<f64>) -> Option<usize> {
        let state = self.shared.state.borrow();
        let mut best = radius.map_or(f64::INFINITY, |radius| radius * radius);
        let mut closest = None;
        for (i, node) in state.nodes.iter().enumerate() {
            let dx = x - node.x;
            let dy = y - node.y;
            let d2 = dx * dx + dy * dy;
            if d2 < best {
                best = d2;
                closest = Some(i);
            }
        }
        closest
    }

    /// Registers a `"tick"` or `"end"` listener (`"tick.name"` to keep several).
    pub fn on(&self, typenames: &str, listener: Option<Listener<SimulationEvent>>) -> Result<&Self, DispatchError> {
        self.shared.events.borrow_mut().on(typenames, listener)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.shared.state.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nodes(&self) -> Vec<Node<P>>
    where
        P: Clone,
    {
        self.shared.state.borrow().nodes.clone()
    }

    pub fn with_nodes<R>(&self, f: impl FnOnce(&[Node<P>]) -> R) -> R {
        f(&self.shared.state.borrow().nodes)
    }

    /// Mutable node access. Forces are not re-initialized; use
    /// [`Simulation::set_nodes`] when the node set itself changes.
    pub fn with_nodes_mut<R>(&self, f: impl FnOnce(&mut [Node<P>]) -> R) -> R {
        f(&mut self.shared.state.borrow_mut().nodes)
    }

    pub fn pin(&self, index: usize, x: f64, y: f64) {
        if let Some(node) = self.shared.state.borrow_mut().nodes.get_mut(index) {
            node.fx = Some(x);
            node.fy = Some(y);
        }
    }

    pub fn unpin(&self, index: usize) {
        if let Some(node) = self.shared.state.borrow_mut().nodes.get_mut(index) {
            node.fx = None;
            node.fy = None;
        }
    }
}

impl<P> Drop for Simulation<P> {
    fn drop(&mut self) {
        self.stepper.stop();
    }
}

impl<P> fmt::Debug for Simulation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Simulation")
            .field("nodes", &state.nodes.len())
            .field("forces", &state.forces.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("alpha", &state.alpha)
            .field("running", &self.stepper.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::force::{Accessor, Center, Link, LinkForce, ManyBody};
    use crate::timer::{FrameRequest, ManualClock};

    fn manual() -> (ManualClock, Scheduler) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn unplaced_nodes_land_on_a_spiral() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, (0..4).map(|i| Node::new(format!("n{i}"))).collect());
        simulation.stop();

        simulation.with_nodes(|nodes| {
            assert_eq!((nodes[0].x, nodes[0].y), (0.0, 0.0));
            let r1 = (nodes[1].x.powi(2) + nodes[1].y.powi(2)).sqrt();
            assert!((r1 - 10.0).abs() < 1e-9);
            let r3 = (nodes[3].x.powi(2) + nodes[3].y.powi(2)).sqrt();
            assert!((r3 - 10.0 * 3f64.sqrt()).abs() < 1e-9);
            assert!(nodes.iter().all(|node| node.vx == 0.0 && node.vy == 0.0));
            assert_eq!(nodes[2].index, 2);
        });
    }

    #[test]
    fn pinned_nodes_start_at_their_pin() {
        let (_, scheduler) = manual();
        let mut node = Node::new("a");
        node.fx = Some(4.0);
        node.fy = Some(-2.0);
        let simulation = Simulation::new(&scheduler, vec![node]);
        simulation.stop();
        simulation.with_nodes(|nodes| assert_eq!((nodes[0].x, nodes[0].y), (4.0, -2.0)));
    }

    #[test]
    fn alpha_cools_geometrically_toward_target() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, Vec::<Node>::new());
        simulation.stop();
        let decay = simulation.alpha_decay();
        simulation.tick(1);
        assert!((simulation.alpha() - (1.0 - decay)).abs() < 1e-12);

        simulation.set_alpha_target(0.5).tick(1000);
        assert!((simulation.alpha() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn velocity_decay_round_trips_through_friction() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, Vec::<Node>::new());
        assert!((simulation.velocity_decay() - 0.4).abs() < 1e-12);
        simulation.set_velocity_decay(0.1);
        assert!((simulation.velocity_decay() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn replacing_a_force_keeps_its_position() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, vec![Node::new("a"), Node::new("b")]);
        simulation
            .add_force("charge", Box::new(ManyBody::new()))
            .and_then(|s| s.add_force("center", Box::new(Center::default())))
            .and_then(|s| s.add_force("charge", Box::new(ManyBody::new().strength(-10.0))))
            .unwrap();
        assert_eq!(simulation.force_names(), vec!["charge", "center"]);

        assert!(simulation.remove_force("charge").is_some());
        assert!(simulation.remove_force("charge").is_none());
        assert_eq!(simulation.force_names(), vec!["center"]);
    }

    #[test]
    fn unresolved_link_is_reported_at_registration() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, vec![Node::new("a")]);
        let error = simulation
            .add_force("link", Box::new(LinkForce::new(vec![Link::new("a", "b")])))
            .unwrap_err();
        assert_eq!(error, LayoutError::MissingNode("b".into()));
        assert!(simulation.force_names().is_empty());
    }

    #[test]
    fn rejected_node_set_leaves_the_simulation_usable() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(
            &scheduler,
            vec![Node::new("a"), Node::new("b"), Node::new("c")],
        );
        simulation.stop();
        simulation
            .add_force("link", Box::new(LinkForce::new(vec![Link::new("b", "c")])))
            .unwrap()
            .add_force("charge", Box::new(ManyBody::new()))
            .unwrap();

        let error = simulation.set_nodes(vec![Node::new("a")]).unwrap_err();
        assert_eq!(error, LayoutError::MissingNode("b".into()));
        assert_eq!(simulation.len(), 3);

        simulation.tick(3);
        simulation.with_nodes(|nodes| {
            let ids = nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
            assert_eq!(ids, ["a", "b", "c"]);
            assert!(nodes.iter().all(|node| node.x.is_finite() && node.y.is_finite()));
        });
    }

    #[test]
    fn payload_travels_with_its_node() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(
            &scheduler,
            vec![Node::with_payload("heavy", 3.0), Node::with_payload("light", 0.5)],
        );
        simulation.stop();
        let by_weight = Accessor::function(|node: &Node<f64>, _| -10.0 * node.payload);
        simulation
            .add_force("charge", Box::new(ManyBody::default().strength(by_weight)))
            .unwrap();
        simulation.tick(5);

        let payloads = simulation.nodes().into_iter().map(|node| node.payload).collect::<Vec<_>>();
        assert_eq!(payloads, vec![3.0, 0.5]);
    }

    #[test]
    fn find_respects_radius() {
        let (_, scheduler) = manual();
        let simulation = Simulation::new(
            &scheduler,
            vec![Node::at("a", 0.0, 0.0), Node::at("b", 10.0, 0.0)],
        );
        assert_eq!(simulation.find(8.0, 0.0, None), Some(1));
        assert_eq!(simulation.find(5.0, 5.0, Some(1.0)), None);
    }

    #[test]
    fn running_simulation_ticks_and_ends_once() {
        let (clock, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, vec![Node::new("a"), Node::new("b")]);
        simulation.set_alpha_decay(0.5);

        let ticks = Rc::new(Cell::new(0));
        let ends = Rc::new(Cell::new(0));
        let tick_count = ticks.clone();
        let end_count = ends.clone();
        simulation
            .on("tick", Some(Rc::new(move |_: &SimulationEvent| tick_count.set(tick_count.get() + 1))))
            .unwrap()
            .on("end", Some(Rc::new(move |_: &SimulationEvent| end_count.set(end_count.get() + 1))))
            .unwrap();

        let mut request = FrameRequest::NextFrame;
        for _ in 0..50 {
            clock.advance(16.0);
            request = scheduler.wake();
        }

        // 0.5^10 is the first power below 0.001
        assert_eq!(ticks.get(), 10);
        assert_eq!(ends.get(), 1);
        assert_eq!(request, FrameRequest::Idle);
        assert!(!simulation.is_running());
    }

    #[test]
    fn dropping_the_simulation_stops_its_timer() {
        let (clock, scheduler) = manual();
        let simulation = Simulation::new(&scheduler, vec![Node::new("a")]);
        drop(simulation);
        clock.advance(16.0);
        assert_eq!(scheduler.wake(), FrameRequest::Idle);
    }
}
