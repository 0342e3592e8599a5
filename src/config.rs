use serde::{Deserialize, Serialize};

use crate::force::{Accessor, Center, Force, Link, LinkForce, ManyBody};
use crate::graph::Status;
use crate::interpolate::Rgba;
use crate::simulation::SimulationConfig;
use crate::transition::DEFAULT_DURATION_MS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub pass: Rgba,
    pub fail: Rgba,
    pub skip: Rgba,
    pub unknown: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            pass: Rgba::rgb(0x00, 0x80, 0x00),
            fail: Rgba::rgb(0xff, 0x00, 0x00),
            skip: Rgba::rgb(0x80, 0x80, 0x80),
            unknown: Rgba::rgb(0x00, 0x00, 0x00),
        }
    }
}

impl Palette {
    pub fn colour(&self, status: Status) -> Rgba {
        match status {
            Status::Pass => self.pass,
            Status::Fail => self.fail,
            Status::Skip => self.skip,
            Status::Unknown => self.unknown,
        }
    }
}

/// Everything tunable about how a run graph is laid out and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub simulation: SimulationConfig,
    pub charge: f64,
    pub theta: f64,
    pub distance_min: f64,
    pub distance_max: Option<f64>,
    pub link_strength: f64,
    pub link_iterations: usize,
    /// Multiplier on the automatic link length unit.
    pub link_scale: f64,
    /// `alpha_target` while a node is dragged.
    pub drag_alpha_target: f64,
    pub fill_duration_ms: f64,
    pub node_radius: f64,
    pub palette: Palette,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            charge: -30.0,
            theta: 0.9,
            distance_min: 1.0,
            distance_max: None,
            link_strength: 1.0,
            link_iterations: 1,
            link_scale: 1.0,
            drag_alpha_target: 0.3,
            fill_duration_ms: DEFAULT_DURATION_MS,
            node_radius: 15.0,
            palette: Palette::default(),
        }
    }
}

impl LayoutConfig {
    /// Rest length of a `value == 1` link: a third of the viewport extent
    /// shared out over `√n`.
    pub fn length_unit(&self, extent: f64, nodes: usize) -> f64 {
        extent / 3.0 / (nodes.max(1) as f64).sqrt() * self.link_scale
    }

    pub fn many_body<P>(&self) -> ManyBody<P> {
        let force = ManyBody::default()
            .strength(self.charge)
            .theta(self.theta)
            .distance_min(self.distance_min);
        match self.distance_max {
            Some(distance) => force.distance_max(distance),
            None => force,
        }
    }

    pub fn link_force(&self, links: Vec<Link>, length_unit: f64) -> LinkForce {
        LinkForce::new(links)
            .distance(Accessor::function(move |link: &Link, _| {
                length_unit * link.value
            }))
            .strength(self.link_strength)
            .iterations(self.link_iterations)
    }

    /// The `link`, `charge` and `center` forces in registration order.
    pub fn forces<P: 'static>(
        &self,
        links: Vec<Link>,
        nodes: usize,
        extent: f64,
        center: (f64, f64),
    ) -> Vec<(&'static str, Box<dyn Force<P>>)> {
        let unit = self.length_unit(extent, nodes);
        vec![
            ("link", Box::new(self.link_force(links, unit)) as Box<dyn Force<P>>),
            ("charge", Box::new(self.many_body::<P>()) as Box<dyn Force<P>>),
            ("center", Box::new(Center::new(center.0, center.1)) as Box<dyn Force<P>>),
        ]
    }
}
