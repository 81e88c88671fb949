use super::error::{PipelineError, PipelineResult};
use super::id::KernelId;
use super::map::{Edge, KernelSlot};
use super::port::PortDirection;
use std::collections::VecDeque;

/// Validated execution plan for a map.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// All kernels in topological order.
    pub order: Vec<KernelId>,

    /// Kernels with no input ports.
    pub sources: Vec<KernelId>,

    /// Kernels with no output ports.
    pub sinks: Vec<KernelId>,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    /// Number of kernels in the graph
    pub total_kernels: usize,

    /// Number of links in the graph
    pub total_edges: usize,

    /// Number of source kernels (no inputs)
    pub source_kernels: usize,

    /// Number of sink kernels (no outputs)
    pub sink_kernels: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

/// Validates a map and orders it for execution
pub struct PlanCompiler;

impl PlanCompiler {
    /// Compile a map into an execution plan.
    ///
    /// Rejects the graph if it is empty, if any declared port is left
    /// unconnected, if it falls apart into more than one component, or if
    /// it contains a cycle.
    pub(crate) fn compile(kernels: &[KernelSlot], edges: &[Edge]) -> PipelineResult<ExecutionPlan> {
        let start_time = std::time::Instant::now();

        let n = kernels.len();
        if n == 0 {
            return Err(PipelineError::EmptyGraph);
        }

        Self::check_all_ports_connected(kernels)?;

        let (fwd_adj, bwd_adj) = Self::build_adjacency(n, edges);

        Self::check_connected(&fwd_adj, &bwd_adj)?;

        let order = Self::topological_sort(&fwd_adj, &bwd_adj)?;

        let sources = Self::structural(kernels, PortDirection::Input);
        let sinks = Self::structural(kernels, PortDirection::Output);

        let stats = PlanStats {
            total_kernels: n,
            total_edges: edges.len(),
            source_kernels: sources.len(),
            sink_kernels: sinks.len(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(ExecutionPlan {
            order,
            sources,
            sinks,
            stats,
        })
    }

    fn check_all_ports_connected(kernels: &[KernelSlot]) -> PipelineResult<()> {
        for slot in kernels {
            for (port, edge) in slot.ports.iter().zip(&slot.links) {
                if edge.is_none() {
                    return Err(PipelineError::UnconnectedPort {
                        kernel: slot.name.clone(),
                        port: port.name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build forward and backward adjacency lists
    fn build_adjacency(n: usize, edges: &[Edge]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut fwd_adj = vec![Vec::new(); n];
        let mut bwd_adj = vec![Vec::new(); n];

        for edge in edges {
            let from = edge.src.index();
            let to = edge.dst.index();
            if from < n && to < n {
                fwd_adj[from].push(to);
                bwd_adj[to].push(from);
            }
        }

        (fwd_adj, bwd_adj)
    }

    /// Undirected reachability from kernel 0 must cover the whole graph.
    fn check_connected(fwd_adj: &[Vec<usize>], bwd_adj: &[Vec<usize>]) -> PipelineResult<()> {
        let n = fwd_adj.len();
        let mut seen = vec![false; n];
        let mut stack = vec![0usize];
        seen[0] = true;
        let mut reached = 1;

        while let Some(node) = stack.pop() {
            for &next in fwd_adj[node].iter().chain(&bwd_adj[node]) {
                if !seen[next] {
                    seen[next] = true;
                    reached += 1;
                    stack.push(next);
                }
            }
        }

        if reached == n {
            Ok(())
        } else {
            Err(PipelineError::DisconnectedGraph {
                reachable: reached,
                total: n,
            })
        }
    }

    // Kahn's algorithm
    fn topological_sort(fwd_adj: &[Vec<usize>], bwd_adj: &[Vec<usize>]) -> PipelineResult<Vec<KernelId>> {
        let n = fwd_adj.len();
        let mut in_degree: Vec<usize> = bwd_adj.iter().map(Vec::len).collect();

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(KernelId(node as u32));
            for &next in &fwd_adj[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            tracing::warn!(
                "Pipeline graph has a cycle! Only {} of {} kernels ordered.",
                order.len(),
                n
            );
            return Err(PipelineError::CycleDetected);
        }

        Ok(order)
    }

    /// Kernels with no port of `missing` direction. Structural, not
    /// edge-based: a source is a kernel that declares no inputs.
    fn structural(kernels: &[KernelSlot], missing: PortDirection) -> Vec<KernelId> {
        kernels
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.ports.iter().all(|p| p.direction != missing))
            .map(|(idx, _)| KernelId(idx as u32))
            .collect()
    }
}
