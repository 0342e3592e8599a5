//! Run-graph records exchanged with the data source.

use serde::{Deserialize, Serialize};

use crate::force::Link;
use crate::simulation::Node;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Skip,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default)]
    pub group: i64,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: String,
    pub target: String,
    #[serde(default = "unit_value")]
    pub value: f64,
}

fn unit_value() -> f64 {
    1.0
}

/// One test run: the graph of test nodes and their dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub commit: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

impl GraphRecord {
    /// Fresh, unplaced simulation nodes in record order, carrying their status.
    pub fn simulation_nodes(&self) -> Vec<Node<Status>> {
        self.nodes
            .iter()
            .map(|node| Node::with_payload(node.id.as_str(), node.status))
            .collect()
    }

    pub fn simulation_links(&self) -> Vec<Link> {
        self.links
            .iter()
            .map(|link| Link::new(link.source.as_str(), link.target.as_str()).with_value(link.value))
            .collect()
    }

    pub fn status_counts(&self) -> [(Status, usize); 4] {
        let count = |status| self.nodes.iter().filter(|node| node.status == status).count();
        [
            (Status::Pass, count(Status::Pass)),
            (Status::Fail, count(Status::Fail)),
            (Status::Skip, count(Status::Skip)),
            (Status::Unknown, count(Status::Unknown)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_with_defaults() {
        let raw = r#"{
            "commit": "df423i",
            "message": "some new feature",
            "nodes": [
                {"id": "group", "group": 2, "status": "pass"},
                {"id": "test", "status": "flaky"},
                {"id": "lonely"}
            ],
            "links": [{"source": "test", "target": "group", "value": 3}, {"source": "lonely", "target": "group"}]
        }"#;
        let record: GraphRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(record.nodes[0].status, Status::Pass);
        assert_eq!(record.nodes[1].status, Status::Unknown);
        assert_eq!(record.nodes[2].group, 0);
        assert_eq!(record.links[1].value, 1.0);

        let links = record.simulation_links();
        assert_eq!((links[0].source.as_str(), links[0].value), ("test", 3.0));
        let nodes = record.simulation_nodes();
        assert!(nodes.iter().all(|node| node.x.is_nan()));
        assert_eq!(nodes[0].payload, Status::Pass);
        assert_eq!(nodes[1].payload, Status::Unknown);
    }

    #[test]
    fn counts_statuses() {
        let record = GraphRecord {
            commit: "eabb33".into(),
            message: String::new(),
            nodes: vec![
                NodeRecord { id: "a".into(), group: 0, status: Status::Fail },
                NodeRecord { id: "b".into(), group: 0, status: Status::Fail },
                NodeRecord { id: "c".into(), group: 0, status: Status::Skip },
            ],
            links: Vec::new(),
        };
        assert_eq!(record.status_counts()[1], (Status::Fail, 2));
        assert_eq!(record.status_counts()[0], (Status::Pass, 0));
    }
}
