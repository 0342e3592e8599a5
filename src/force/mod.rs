//! Velocity-mutating force kernels.
//!
//! A force sees the node set once at [`Force::initialize`] to build its
//! per-node and per-link caches, then mutates velocities (or, for
//! [`Center`], positions) on every [`Force::apply`].

mod center;
mod link;
mod many_body;

use std::fmt;
use std::rc::Rc;

use rand::{Rng, RngCore};

pub use center::Center;
pub use link::{Link, LinkForce};
pub use many_body::ManyBody;

use crate::error::LayoutError;
use crate::simulation::Node;

/// A force over nodes carrying payload `P`.
pub trait Force<P = ()> {
    fn initialize(&mut self, nodes: &[Node<P>], rng: &mut dyn RngCore) -> Result<(), LayoutError>;

    fn apply(&mut self, nodes: &mut [Node<P>], alpha: f64, rng: &mut dyn RngCore);
}

/// A scalar parameter that is either constant or computed per item.
pub enum Accessor<T> {
    Constant(f64),
    Function(Rc<dyn Fn(&T, usize) -> f64>),
}

impl<T> Accessor<T> {
    pub fn function(f: impl Fn(&T, usize) -> f64 + 'static) -> Self {
        Self::Function(Rc::new(f))
    }

    pub fn evaluate(&self, item: &T, index: usize) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Function(f) => f(item, index),
        }
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(*value),
            Self::Function(f) => Self::Function(Rc::clone(f)),
        }
    }
}

impl<T> From<f64> for Accessor<T> {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Tiny random offset used to separate coincident points.
pub(crate) fn jiggle(rng: &mut dyn RngCore) -> f64 {
    (rng.random::<f64>() - 0.5) * 1e-6
}
