//! Serializable snapshots of a map's shape, for logging and inspection.

use crate::pipeline::buffer::LinkTraffic;
use crate::pipeline::id::{EdgeId, KernelId};
use crate::pipeline::port::PortDescriptor;
use serde::Serialize;

/// Snapshot of a single kernel.
#[derive(Debug, Clone, Serialize)]
pub struct KernelSnapshot {
    pub id: KernelId,
    pub name: String,
    pub ports: Vec<PortDescriptor>,
}

/// Snapshot of a single link.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub src: KernelId,
    pub src_port: String,
    pub dst: KernelId,
    pub dst_port: String,
    pub capacity: usize,
    pub payload: &'static str,
    pub traffic: LinkTraffic,
}

/// Complete topology snapshot of the map.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    pub kernels: Vec<KernelSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl TopologySnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Kernels downstream of `id`, in link order.
    pub fn successors(&self, id: KernelId) -> impl Iterator<Item = KernelId> + '_ {
        self.edges.iter().filter(move |e| e.src == id).map(|e| e.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::port::PortDirection;

    fn sample() -> TopologySnapshot {
        TopologySnapshot {
            kernels: vec![
                KernelSnapshot {
                    id: KernelId(0),
                    name: "Source".into(),
                    ports: vec![PortDescriptor::output::<u8>("0")],
                },
                KernelSnapshot {
                    id: KernelId(1),
                    name: "Sink".into(),
                    ports: vec![PortDescriptor::input::<u8>("0")],
                },
            ],
            edges: vec![EdgeSnapshot {
                id: EdgeId(0),
                src: KernelId(0),
                src_port: "0".into(),
                dst: KernelId(1),
                dst_port: "0".into(),
                capacity: 4,
                payload: "u8",
                traffic: LinkTraffic::default(),
            }],
        }
    }

    #[test]
    fn test_topology_json() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["kernels"][1]["name"], "Sink");
        assert_eq!(value["kernels"][1]["ports"][0]["direction"], "input");
        assert_eq!(value["kernels"][0]["ports"][0]["payload"], "u8");
        assert_eq!(value["edges"][0]["capacity"], 4);
        assert_eq!(value["edges"][0]["traffic"]["sent"], 0);
    }

    #[test]
    fn test_successors() {
        let topo = sample();
        assert_eq!(topo.successors(KernelId(0)).collect::<Vec<_>>(), vec![KernelId(1)]);
        assert_eq!(topo.successors(KernelId(1)).count(), 0);
        assert_eq!(topo.kernels[0].ports[0].direction, PortDirection::Output);
    }
}
