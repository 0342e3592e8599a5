use std::collections::HashMap;

use rand::RngCore;
use tracing::debug;

use super::{Accessor, Force, jiggle};
use crate::error::LayoutError;
use crate::simulation::Node;

/// A spring between two nodes, named by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub index: usize,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value: 1.0,
            index: 0,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }
}

/// Spring force pulling linked nodes toward a rest distance.
///
/// Endpoints are resolved by id when the force is initialized. Unless a
/// strength is given, each link gets `1 / min(degree(source),
/// degree(target))`, and the correction is split between the endpoints so the
/// better connected one moves less.
#[derive(Debug, Clone)]
pub struct LinkForce {
    links: Vec<Link>,
    distance: Accessor<Link>,
    strength: Option<Accessor<Link>>,
    iterations: usize,
    endpoints: Vec<(usize, usize)>,
    distances: Vec<f64>,
    strengths: Vec<f64>,
    bias: Vec<f64>,
}

impl LinkForce {
    pub fn new(links: Vec<Link>) -> Self {
        let links = links
            .into_iter()
            .enumerate()
            .map(|(index, link)| Link { index, ..link })
            .collect();
        Self {
            links,
            distance: Accessor::Constant(30.0),
            strength: None,
            iterations: 1,
            endpoints: Vec::new(),
            distances: Vec::new(),
            strengths: Vec::new(),
            bias: Vec::new(),
        }
    }

    pub fn distance(mut self, distance: impl Into<Accessor<Link>>) -> Self {
        self.distance = distance.into();
        self
    }

    pub fn strength(mut self, strength: impl Into<Accessor<Link>>) -> Self {
        self.strength = Some(strength.into());
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Resolved `(source, target)` node indices, valid after initialization.
    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }
}

impl<P> Force<P> for LinkForce {
    fn initialize(&mut self, nodes: &[Node<P>], _rng: &mut dyn RngCore) -> Result<(), LayoutError> {
        self.endpoints.clear();
        self.distances.clear();
        self.strengths.clear();
        self.bias.clear();

        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect::<HashMap<_, _>>();
        let resolve = |id: &str| {
            by_id
                .get(id)
                .copied()
                .ok_or_else(|| LayoutError::MissingNode(id.to_owned()))
        };

        let endpoints = self
            .links
            .iter()
            .map(|link| -> Result<(usize, usize), LayoutError> {
                Ok((resolve(&link.source)?, resolve(&link.target)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut degree = vec![0usize; nodes.len()];
        for &(source, target) in &endpoints {
            degree[source] += 1;
            degree[target] += 1;
        }

        self.bias = endpoints
            .iter()
            .map(|&(source, target)| {
                degree[source] as f64 / (degree[source] + degree[target]) as f64
            })
            .collect();
        self.strengths = self
            .links
            .iter()
            .zip(&endpoints)
            .enumerate()
            .map(|(i, (link, &(source, target)))| match &self.strength {
                Some(strength) => strength.evaluate(link, i),
                None => 1.0 / degree[source].min(degree[target]) as f64,
            })
            .collect();
        self.distances = self
            .links
            .iter()
            .enumerate()
            .map(|(i, link)| self.distance.evaluate(link, i))
            .collect();
        self.endpoints = endpoints;

        debug!(links = self.links.len(), nodes = nodes.len(), "link force initialized");
        Ok(())
    }

    fn apply(&mut self, nodes: &mut [Node<P>], alpha: f64, rng: &mut dyn RngCore) {
        for _ in 0..self.iterations {
            for (i, &(s, t)) in self.endpoints.iter().enumerate() {
                let (source, target) = (&nodes[s], &nodes[t]);
                let mut x = target.x + target.vx - source.x - source.vx;
                if x == 0.0 {
                    x = jiggle(rng);
                }
                let mut y = target.y + target.vy - source.y - source.vy;
                if y == 0.0 {
                    y = jiggle(rng);
                }

                let mut l = (x * x + y * y).sqrt();
                l = (l - self.distances[i]) / l * alpha * self.strengths[i];
                x *= l;
                y *= l;

                let b = self.bias[i];
                nodes[t].vx -= x * b;
                nodes[t].vy -= y * b;
                nodes[s].vx += x * (1.0 - b);
                nodes[s].vy += y * (1.0 - b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn at_rest(id: &str, x: f64, y: f64) -> Node {
        let mut node = Node::at(id, x, y);
        node.vx = 0.0;
        node.vy = 0.0;
        node
    }

    #[test]
    fn missing_endpoint_is_a_configuration_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let nodes = vec![at_rest("a", 0.0, 0.0)];
        let mut force = LinkForce::new(vec![Link::new("a", "ghost")]);
        assert_eq!(
            force.initialize(&nodes, &mut rng),
            Err(LayoutError::MissingNode("ghost".into()))
        );
    }

    #[test]
    fn failed_initialize_drops_the_old_endpoints() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes = vec![at_rest("a", 0.0, 0.0), at_rest("b", 10.0, 0.0)];
        let mut force = LinkForce::new(vec![Link::new("a", "b")]);
        force.initialize(&nodes, &mut rng).unwrap();
        assert_eq!(force.endpoints(), &[(0, 1)]);

        nodes.truncate(1);
        assert!(force.initialize(&nodes, &mut rng).is_err());
        assert!(force.endpoints().is_empty());

        force.apply(&mut nodes, 1.0, &mut rng);
        assert_eq!((nodes[0].vx, nodes[0].vy), (0.0, 0.0));
    }

    #[test]
    fn degree_sets_default_strength_and_bias() {
        let mut rng = StdRng::seed_from_u64(0);
        let nodes = vec![
            at_rest("hub", 0.0, 0.0),
            at_rest("a", 1.0, 0.0),
            at_rest("b", 2.0, 0.0),
        ];
        let mut force = LinkForce::new(vec![Link::new("a", "hub"), Link::new("b", "hub")]);
        force.initialize(&nodes, &mut rng).unwrap();

        assert_eq!(force.endpoints(), &[(1, 0), (2, 0)]);
        assert_eq!(force.strengths, vec![1.0, 1.0]);
        assert!((force.bias[0] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(force.links()[1].index, 1);
    }

    #[test]
    fn stretched_link_pulls_endpoints_together() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes = vec![at_rest("a", 0.0, 0.0), at_rest("b", 100.0, 0.0)];
        let mut force = LinkForce::new(vec![Link::new("a", "b")]).distance(50.0);
        force.initialize(&nodes, &mut rng).unwrap();
        force.apply(&mut nodes, 1.0, &mut rng);

        // half of the 50 unit excess goes to each end
        assert!((nodes[0].vx - 25.0).abs() < 1e-9);
        assert!((nodes[1].vx + 25.0).abs() < 1e-9);
    }

    #[test]
    fn compressed_link_pushes_endpoints_apart() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut nodes = vec![at_rest("a", 0.0, 0.0), at_rest("b", 0.0, 10.0)];
        let mut force = LinkForce::new(vec![Link::new("a", "b")])
            .distance(30.0)
            .strength(0.5);
        force.initialize(&nodes, &mut rng).unwrap();
        force.apply(&mut nodes, 1.0, &mut rng);

        assert!(nodes[0].vy < 0.0);
        assert!(nodes[1].vy > 0.0);
    }
}
