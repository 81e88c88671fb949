//! Test map builders

use crossbeam_channel::{unbounded, Receiver};
use kernelflow_rs::pipeline::{CollectSink, IterSource, KernelId, Map, Transform};

/// Builder for a source → +1 → collect chain over `0..count`
pub struct ChainBuilder {
    count: u64,
    capacity: usize,
}

impl ChainBuilder {
    pub fn new(count: u64) -> Self {
        Self { count, capacity: 1 }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The map, its three kernel ids, and the sink's receiving end.
    pub fn build(self) -> (Map, [KernelId; 3], Receiver<u64>) {
        let (tx, rx) = unbounded();
        let mut map = Map::new();

        let src = map.add(IterSource::new("Source", 0..self.count));
        let inc = map.add(Transform::new("Increment", |n: &u64, out: &mut u64| {
            *out = n + 1
        }));
        let sink = map.add(CollectSink::new(tx));

        map.link_with_capacity(src, inc, self.capacity)
            .expect("source links to increment");
        map.link_with_capacity(inc, sink, self.capacity)
            .expect("increment links to sink");

        (map, [src, inc, sink], rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder() {
        let (map, ids, _rx) = ChainBuilder::new(3).capacity(2).build();

        assert_eq!(map.kernel_count(), 3);
        assert_eq!(map.kernel_name(ids[1]), Some("Increment"));
        assert!(map.edges().iter().all(|e| e.capacity == 2));
    }
}
