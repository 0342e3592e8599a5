use rand::RngCore;

use super::{Accessor, Force, jiggle};
use crate::error::LayoutError;
use crate::quadtree::{Mass, QuadKind, QuadPoint, Quadtree};
use crate::simulation::Node;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    index: usize,
    x: f64,
    y: f64,
}

impl QuadPoint for Body {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Barnes-Hut approximated n-body force. Negative strength repels.
#[derive(Debug, Clone)]
pub struct ManyBody<P = ()> {
    strength: Accessor<Node<P>>,
    strengths: Vec<f64>,
    theta2: f64,
    distance_min2: f64,
    distance_max2: f64,
}

impl<P> Default for ManyBody<P> {
    fn default() -> Self {
        Self {
            strength: Accessor::Constant(-30.0),
            strengths: Vec::new(),
            theta2: 0.81,
            distance_min2: 1.0,
            distance_max2: f64::INFINITY,
        }
    }
}

impl ManyBody {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P> ManyBody<P> {
    pub fn strength(mut self, strength: impl Into<Accessor<Node<P>>>) -> Self {
        self.strength = strength.into();
        self
    }

    pub fn theta(mut self, theta: f64) -> Self {
        self.theta2 = theta * theta;
        self
    }

    pub fn distance_min(mut self, distance: f64) -> Self {
        self.distance_min2 = distance * distance;
        self
    }

    pub fn distance_max(mut self, distance: f64) -> Self {
        self.distance_max2 = distance * distance;
        self
    }

    fn accumulate(&self, tree: &mut Quadtree<Body>) {
        tree.visit_after(|tree, id, _| {
            let Some(quad) = tree.quad(id) else {
                return;
            };

            let mass = match &quad.kind {
                QuadKind::Internal(children) => {
                    let (mut value, mut weight, mut x, mut y) = (0.0, 0.0, 0.0, 0.0);
                    for child in children.iter().flatten() {
                        let Some(child) = tree.quad(*child) else {
                            continue;
                        };
                        let c = child.mass.value.abs();
                        if c != 0.0 {
                            value += child.mass.value;
                            weight += c;
                            x += c * child.mass.x;
                            y += c * child.mass.y;
                        }
                    }
                    Mass {
                        value,
                        x: x / weight,
                        y: y / weight,
                    }
                }
                QuadKind::Leaf { point, .. } => Mass {
                    value: tree
                        .chain(id)
                        .map(|body| self.strengths.get(body.index).copied().unwrap_or(0.0))
                        .sum(),
                    x: point.x,
                    y: point.y,
                },
            };

            if let Some(quad) = tree.quad_mut(id) {
                quad.mass = mass;
            }
        });
    }
}

impl<P> Force<P> for ManyBody<P> {
    fn initialize(&mut self, nodes: &[Node<P>], _rng: &mut dyn RngCore) -> Result<(), LayoutError> {
        self.strengths = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| self.strength.evaluate(node, i))
            .collect();
        Ok(())
    }

    fn apply(&mut self, nodes: &mut [Node<P>], alpha: f64, rng: &mut dyn RngCore) {
        let mut tree = Quadtree::from_points(nodes.iter().enumerate().map(|(index, node)| Body {
            index,
            x: node.x,
            y: node.y,
        }));
        self.accumulate(&mut tree);

        for (i, node) in nodes.iter_mut().enumerate() {
            let (mut dvx, mut dvy) = (0.0, 0.0);

            tree.visit(|id, quad, extent| {
                let mass = quad.mass;
                if mass.value == 0.0 {
                    return true;
                }

                let mut x = mass.x - node.x;
                let mut y = mass.y - node.y;
                let w = extent.width();
                let mut l = x * x + y * y;

                if w * w / self.theta2 < l {
                    if l < self.distance_max2 {
                        if x == 0.0 {
                            x = jiggle(rng);
                            l += x * x;
                        }
                        if y == 0.0 {
                            y = jiggle(rng);
                            l += y * y;
                        }
                        if l < self.distance_min2 {
                            l = (self.distance_min2 * l).sqrt();
                        }
                        dvx += x * mass.value * alpha / l;
                        dvy += y * mass.value * alpha / l;
                    }
                    return true;
                }

                let QuadKind::Leaf { point, next } = &quad.kind else {
                    return false;
                };
                if l >= self.distance_max2 {
                    return false;
                }

                if point.index != i || next.is_some() {
                    if x == 0.0 {
                        x = jiggle(rng);
                        l += x * x;
                    }
                    if y == 0.0 {
                        y = jiggle(rng);
                        l += y * y;
                    }
                    if l < self.distance_min2 {
                        l = (self.distance_min2 * l).sqrt();
                    }
                }

                for body in tree.chain(id) {
                    if body.index != i {
                        let w = self.strengths.get(body.index).copied().unwrap_or(0.0) * alpha / l;
                        dvx += x * w;
                        dvy += y * w;
                    }
                }
                false
            });

            node.vx += dvx;
            node.vy += dvy;
        }
    }
}
