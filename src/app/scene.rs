//! The drawn scene: one element per node of the selected run, kept across
//! runs by node id, plus the simulation and transitions that animate it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, bail};
use tracing::{debug, info};

use runviz::interpolate::{number, rgba};
use runviz::quadtree::Quadtree;
use runviz::transition::{TweenFactory, TweenFn};
use runviz::{
    Bound, ElementId, GraphRecord, LayoutConfig, Link, Node, NodeRecord, Rgba, Scheduler,
    Simulation, Status, Transitions, bind_key, ease,
};

pub(super) const FILL_TRANSITION: &str = "fill";
pub(super) const FADE_TRANSITION: &str = "fade";

/// World-space size the automatic link length is derived from.
const VIEW_EXTENT: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct NodeStyle {
    pub fill: Rgba,
    pub opacity: f64,
}

type Styles = Rc<RefCell<HashMap<ElementId, NodeStyle>>>;

/// A drawable link between two node indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Edge {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

pub(super) struct Scene {
    scheduler: Scheduler,
    transitions: Transitions,
    simulation: Simulation<Status>,
    config: LayoutConfig,
    nodes: Vec<Bound<ElementId, NodeRecord>>,
    links: Vec<Edge>,
    record_links: Vec<Link>,
    styles: Styles,
    next_element: ElementId,
    revision: u64,
}

impl Scene {
    pub(super) fn new(config: LayoutConfig) -> Self {
        let scheduler = Scheduler::system();
        let simulation = Simulation::with_config(&scheduler, Vec::new(), &config.simulation);
        simulation.stop();

        Self {
            transitions: Transitions::new(&scheduler),
            scheduler,
            simulation,
            config,
            nodes: Vec::new(),
            links: Vec::new(),
            record_links: Vec::new(),
            styles: Rc::new(RefCell::new(HashMap::new())),
            next_element: 1,
            revision: 0,
        }
    }

    /// Reconciles the scene against `record`: nodes with a known id keep
    /// their element and their motion, new ids fade in, missing ids leave.
    ///
    /// Links naming an id the run does not contain are left out and reported
    /// as an error once the rest of the run is bound and running.
    pub(super) fn show_run(&mut self, record: &GraphRecord) -> Result<()> {
        let previous = self.simulation.with_nodes(|nodes| {
            self.nodes
                .iter()
                .zip(nodes)
                .map(|(bound, node)| (bound.handle, node.clone()))
                .collect::<HashMap<_, _>>()
        });

        let group = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let join = bind_key(group, record.nodes.clone(), |node: &NodeRecord, _| {
            node.id.clone()
        });

        let next_element = &mut self.next_element;
        let mut entered = Vec::new();
        let (merged, exits) = join.join(|_, _| {
            let element = *next_element;
            *next_element += 1;
            entered.push(element);
            element
        });

        for exit in &exits {
            self.transitions.interrupt(exit.handle, FILL_TRANSITION);
            self.transitions.interrupt(exit.handle, FADE_TRANSITION);
            self.styles.borrow_mut().remove(&exit.handle);
        }

        let mut recoloured = HashMap::new();
        let mut nodes = Vec::with_capacity(merged.len());
        {
            let mut styles = self.styles.borrow_mut();
            for bound in &merged {
                let status = bound.datum.status;
                let colour = self.config.palette.colour(status);
                match previous.get(&bound.handle) {
                    Some(node) => {
                        if node.payload != status {
                            recoloured.insert(bound.handle, colour);
                        }
                        nodes.push(Node {
                            fx: None,
                            fy: None,
                            payload: status,
                            ..node.clone()
                        });
                    }
                    None => {
                        styles.insert(
                            bound.handle,
                            NodeStyle {
                                fill: colour,
                                opacity: 0.0,
                            },
                        );
                        nodes.push(Node::with_payload(bound.datum.id.as_str(), status));
                    }
                }
            }
        }

        let index_by_id = merged
            .iter()
            .enumerate()
            .map(|(index, bound)| (bound.datum.id.as_str(), index))
            .collect::<HashMap<_, _>>();
        let mut dangling = Vec::new();
        let mut edges = Vec::new();
        let mut resolvable = Vec::new();
        for link in record.simulation_links() {
            match (
                index_by_id.get(link.source.as_str()),
                index_by_id.get(link.target.as_str()),
            ) {
                (Some(&source), Some(&target)) => {
                    edges.push(Edge {
                        source,
                        target,
                        value: link.value,
                    });
                    resolvable.push(link);
                }
                _ => {
                    for id in [&link.source, &link.target] {
                        if !index_by_id.contains_key(id.as_str()) && !dangling.contains(id) {
                            dangling.push(id.clone());
                        }
                    }
                }
            }
        }
        self.links = edges;
        self.record_links = resolvable;
        self.nodes = merged;
        self.revision = self.revision.wrapping_add(1);

        info!(
            commit = %record.commit,
            entered = entered.len(),
            exited = exits.len(),
            recoloured = recoloured.len(),
            "run bound"
        );

        self.fade_in(&entered)?;
        self.recolour(recoloured)?;

        self.simulation.remove_force("link");
        self.simulation.set_nodes(nodes)?;
        self.register_forces()?;
        self.simulation.set_alpha(1.0).restart();

        if !dangling.is_empty() {
            bail!(
                "run {} links to missing nodes: {}",
                record.commit,
                dangling.join(", ")
            );
        }
        Ok(())
    }

    fn register_forces(&self) -> Result<()> {
        let forces = self.config.forces::<Status>(
            self.record_links.clone(),
            self.nodes.len(),
            VIEW_EXTENT,
            (0.0, 0.0),
        );
        for (name, force) in forces {
            self.simulation.add_force(name, force)?;
        }
        Ok(())
    }

    fn fade_in(&self, elements: &[ElementId]) -> Result<()> {
        if elements.is_empty() {
            return Ok(());
        }

        let styles = Rc::clone(&self.styles);
        let factory: TweenFactory = Rc::new(move |element: ElementId, _: usize| {
            let styles = Rc::clone(&styles);
            let opacity = number(0.0, 1.0);
            let tween: TweenFn = Box::new(move |t| {
                if let Some(style) = styles.borrow_mut().get_mut(&element) {
                    style.opacity = opacity(t);
                }
            });
            Some(tween)
        });

        self.transitions
            .begin(FADE_TRANSITION, elements)
            .duration(self.config.fill_duration_ms * 2.0)?
            .ease(ease::cubic_out)?
            .tween("opacity", Some(factory))?;
        Ok(())
    }

    /// Animates each element's fill from whatever it shows when the
    /// transition starts to its new status colour.
    fn recolour(&self, targets: HashMap<ElementId, Rgba>) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let elements = targets.keys().copied().collect::<Vec<_>>();
        let styles = Rc::clone(&self.styles);
        let factory: TweenFactory = Rc::new(move |element: ElementId, _: usize| {
            let to = *targets.get(&element)?;
            let from = styles.borrow().get(&element)?.fill;
            let styles = Rc::clone(&styles);
            let fill = rgba(from, to);
            let tween: TweenFn = Box::new(move |t| {
                if let Some(style) = styles.borrow_mut().get_mut(&element) {
                    style.fill = fill(t);
                }
            });
            Some(tween)
        });

        let transition = self.transitions.begin(FILL_TRANSITION, &elements);
        transition
            .duration(self.config.fill_duration_ms)?
            .tween("fill", Some(factory))?
            .on(
                "interrupt.log",
                Some(Rc::new(|event: &runviz::TransitionEvent| {
                    debug!(element = event.element, "fill transition interrupted");
                })),
            )?;
        Ok(())
    }

    pub(super) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(super) fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    pub(super) fn simulation(&self) -> &Simulation<Status> {
        &self.simulation
    }

    pub(super) fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub(super) fn nodes(&self) -> &[Bound<ElementId, NodeRecord>] {
        &self.nodes
    }

    pub(super) fn links(&self) -> &[Edge] {
        &self.links
    }

    /// Bumped on every rebind; caches keyed on node indices compare it.
    pub(super) fn revision(&self) -> u64 {
        self.revision
    }

    pub(super) fn style(&self, element: ElementId) -> NodeStyle {
        self.styles.borrow().get(&element).copied().unwrap_or(NodeStyle {
            fill: self.config.palette.unknown,
            opacity: 1.0,
        })
    }

    pub(super) fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|bound| bound.datum.id == id)
    }

    pub(super) fn degree(&self, index: usize) -> usize {
        self.links
            .iter()
            .filter(|edge| edge.source == index || edge.target == index)
            .count()
    }

    pub(super) fn status_counts(&self) -> [(Status, usize); 4] {
        let count = |status| {
            self.nodes
                .iter()
                .filter(|bound| bound.datum.status == status)
                .count()
        };
        [
            (Status::Pass, count(Status::Pass)),
            (Status::Fail, count(Status::Fail)),
            (Status::Skip, count(Status::Skip)),
            (Status::Unknown, count(Status::Unknown)),
        ]
    }

    /// Spatial index over the current positions, for the overlay.
    pub(super) fn quadtree(&self) -> Quadtree<[f64; 2]> {
        self.simulation
            .with_nodes(|nodes| Quadtree::from_points(nodes.iter().map(|node| [node.x, node.y])))
    }

    pub(super) fn set_charge(&mut self, charge: f64) -> Result<()> {
        self.config.charge = charge;
        self.simulation
            .add_force("charge", Box::new(self.config.many_body::<Status>()))?;
        self.reheat();
        Ok(())
    }

    pub(super) fn set_link_scale(&mut self, scale: f64) -> Result<()> {
        self.config.link_scale = scale;
        let unit = self.config.length_unit(VIEW_EXTENT, self.nodes.len());
        let force = self.config.link_force(self.record_links.clone(), unit);
        self.simulation.add_force("link", Box::new(force))?;
        self.reheat();
        Ok(())
    }

    pub(super) fn set_velocity_decay(&mut self, decay: f64) {
        self.config.simulation.velocity_decay = decay;
        self.simulation.set_velocity_decay(decay);
        self.reheat();
    }

    pub(super) fn reheat(&self) {
        self.simulation.set_alpha(1.0).restart();
    }

    pub(super) fn stop(&self) {
        self.simulation.stop();
    }

    pub(super) fn drag_start(&self, index: usize, x: f64, y: f64) {
        self.simulation
            .set_alpha_target(self.config.drag_alpha_target)
            .restart();
        self.simulation.pin(index, x, y);
    }

    pub(super) fn drag_to(&self, index: usize, x: f64, y: f64) {
        self.simulation.pin(index, x, y);
    }

    pub(super) fn drag_end(&self, index: usize) {
        self.simulation
            .set_alpha_target(self.config.simulation.alpha_target);
        self.simulation.unpin(index);
    }
}

#[cfg(test)]
mod tests {
    use runviz::{LinkRecord, ManualClock};

    use super::*;

    fn record(commit: &str, nodes: &[(&str, Status)], links: &[(&str, &str)]) -> GraphRecord {
        GraphRecord {
            commit: commit.to_owned(),
            message: String::new(),
            nodes: nodes
                .iter()
                .map(|&(id, status)| NodeRecord {
                    id: id.to_owned(),
                    group: 0,
                    status,
                })
                .collect(),
            links: links
                .iter()
                .map(|&(source, target)| LinkRecord {
                    source: source.to_owned(),
                    target: target.to_owned(),
                    value: 1.0,
                })
                .collect(),
        }
    }

    fn manual_scene() -> (Scene, ManualClock) {
        let clock = ManualClock::new();
        let mut scene = Scene::new(LayoutConfig::default());
        let scheduler = Scheduler::new(clock.clone());
        scene.simulation = Simulation::with_config(&scheduler, Vec::new(), &scene.config.simulation);
        scene.transitions = Transitions::new(&scheduler);
        scene.scheduler = scheduler;
        (scene, clock)
    }

    #[test]
    fn kept_nodes_keep_their_element_and_position() {
        let (mut scene, _clock) = manual_scene();
        scene
            .show_run(&record("a", &[("a", Status::Pass), ("b", Status::Pass)], &[("a", "b")]))
            .unwrap();
        scene.simulation().tick(5);
        let b_element = scene.nodes()[1].handle;
        let b_position = scene.simulation().with_nodes(|nodes| (nodes[1].x, nodes[1].y));

        scene
            .show_run(&record("b", &[("b", Status::Pass), ("c", Status::Pass)], &[("b", "c")]))
            .unwrap();

        assert_eq!(scene.nodes()[0].handle, b_element);
        assert_eq!(
            scene.simulation().with_nodes(|nodes| (nodes[0].x, nodes[0].y)),
            b_position
        );
        assert_eq!(
            scene.links(),
            &[Edge {
                source: 0,
                target: 1,
                value: 1.0
            }]
        );
        assert_eq!(scene.style(scene.nodes()[1].handle).opacity, 0.0);
    }

    #[test]
    fn status_change_animates_the_fill() {
        let (mut scene, clock) = manual_scene();
        scene.show_run(&record("a", &[("a", Status::Pass)], &[])).unwrap();
        let element = scene.nodes()[0].handle;
        let pass = scene.config().palette.pass;
        assert_eq!(scene.style(element).fill, pass);

        scene.show_run(&record("b", &[("a", Status::Fail)], &[])).unwrap();
        for _ in 0..30 {
            clock.advance(20.0);
            scene.scheduler().wake();
        }

        assert_eq!(scene.style(element).fill, scene.config().palette.fail);
        assert_eq!(scene.style(element).opacity, 1.0);
        assert_eq!(scene.transitions().pending(element), 0);
    }

    #[test]
    fn dangling_links_are_reported_and_the_run_still_lays_out() {
        let (mut scene, _clock) = manual_scene();
        scene.simulation().stop();
        let error = scene
            .show_run(&record(
                "a",
                &[("a", Status::Pass), ("b", Status::Fail)],
                &[("a", "ghost"), ("a", "b")],
            ))
            .unwrap_err();

        assert!(error.to_string().contains("ghost"));
        assert_eq!(scene.links().len(), 1);
        assert_eq!((scene.links()[0].source, scene.links()[0].target), (0, 1));
        assert_eq!(scene.simulation().force_names(), vec!["link", "charge", "center"]);
        assert!(scene.simulation().is_running());
        assert_eq!(scene.simulation().alpha(), 1.0);
    }

    #[test]
    fn nodes_carry_their_status() {
        let (mut scene, _clock) = manual_scene();
        scene
            .show_run(&record("a", &[("a", Status::Pass), ("b", Status::Skip)], &[]))
            .unwrap();
        scene.show_run(&record("b", &[("b", Status::Fail)], &[])).unwrap();

        let statuses = scene
            .simulation()
            .with_nodes(|nodes| nodes.iter().map(|node| node.payload).collect::<Vec<_>>());
        assert_eq!(statuses, vec![Status::Fail]);
    }
}
