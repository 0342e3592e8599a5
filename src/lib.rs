//! Force-directed layout core for the run-graph viewer.
//!
//! Everything here is single-threaded and cooperative: a [`Scheduler`] owned
//! by the host is woken once per display frame and drives both the
//! [`Simulation`] stepper and any running [`Transitions`].

pub mod config;
pub mod dispatch;
pub mod ease;
pub mod error;
pub mod force;
pub mod graph;
pub mod interpolate;
pub mod join;
pub mod quadtree;
pub mod simulation;
pub mod timer;
pub mod transition;

pub use config::{LayoutConfig, Palette};
pub use dispatch::{Dispatch, Listener};
pub use error::{DispatchError, LayoutError, TransitionError};
pub use force::{Accessor, Center, Force, Link, LinkForce, ManyBody};
pub use graph::{GraphRecord, LinkRecord, NodeRecord, Status};
pub use interpolate::Rgba;
pub use join::{Bound, Enter, Join, bind_index, bind_key};
pub use quadtree::{QuadPoint, Quadtree};
pub use simulation::{Node, Simulation, SimulationConfig, SimulationEvent};
pub use timer::{Clock, FrameRequest, ManualClock, Scheduler, SystemClock, Timer};
pub use transition::{ElementId, State, Transition, TransitionEvent, Transitions};
