use rand::RngCore;

use super::Force;
use crate::error::LayoutError;
use crate::simulation::Node;

/// Translates every node so the centroid lands on `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Center {
    x: f64,
    y: f64,
}

impl Center {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Center {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl<P> Force<P> for Center {
    fn initialize(&mut self, _nodes: &[Node<P>], _rng: &mut dyn RngCore) -> Result<(), LayoutError> {
        Ok(())
    }

    fn apply(&mut self, nodes: &mut [Node<P>], _alpha: f64, _rng: &mut dyn RngCore) {
        if nodes.is_empty() {
            return;
        }

        let n = nodes.len() as f64;
        let (sx, sy) = nodes
            .iter()
            .fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
        let dx = sx / n - self.x;
        let dy = sy / n - self.y;

        for node in nodes {
            node.x -= dx;
            node.y -= dy;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn moves_centroid_onto_target_without_changing_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes = vec![Node::at("a", 10.0, 0.0), Node::at("b", 20.0, 10.0)];
        let mut center = Center::new(1.0, 1.0);
        center.apply(&mut nodes, 1.0, &mut rng);

        assert_eq!((nodes[0].x, nodes[0].y), (-4.0, -4.0));
        assert_eq!((nodes[1].x, nodes[1].y), (6.0, 6.0));
    }

    #[test]
    fn empty_node_set_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes: Vec<Node> = Vec::new();
        Center::default().apply(&mut nodes, 1.0, &mut rng);
        assert!(nodes.is_empty());
    }
}
