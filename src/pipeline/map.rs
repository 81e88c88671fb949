//! The map: kernels, the links between their ports, and the entry points
//! that start execution.
//!
//! ```ignore
//! let mut map = Map::new();
//! let camera = map.add(CaptureSource::new(camera)?);
//! let edges = map.chain(camera, Transform::new("Edges", detect_edges))?;
//! let overlay = map.chain(edges.dst(), Transform::new("Overlay", draw))?;
//! map.chain(overlay.dst(), ForEachSink::new("Display", show))?;
//! let report = map.exe()?;
//! ```
//!
//! All links are declared before `exe`/`spawn`. Once execution has started
//! the map only answers questions about its topology.

use crate::config::RuntimeConfig;
use crate::pipeline::buffer::{LinkCounters, MAX_LINK_CAPACITY};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, KernelId};
use crate::pipeline::kernel::{Kernel, KernelContext};
use crate::pipeline::plan::{ExecutionPlan, PlanCompiler};
use crate::pipeline::port::{PortDescriptor, PortDirection};
use crate::pipeline::scheduler::{KernelTask, RunReport, RunningMap, Scheduler};
use crate::pipeline::topology::{EdgeSnapshot, KernelSnapshot, TopologySnapshot};
use std::sync::Arc;

/// One side of a link: a kernel and, optionally, which of its ports.
///
/// With no port name the map picks one: the kernel's only port of the
/// right direction, or its only unconnected one. A destination without a
/// name first tries the input named like the source port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    pub kernel: KernelId,
    pub port: Option<String>,
}

impl From<KernelId> for PortRef {
    fn from(kernel: KernelId) -> Self {
        Self { kernel, port: None }
    }
}

impl<S: Into<String>> From<(KernelId, S)> for PortRef {
    fn from((kernel, port): (KernelId, S)) -> Self {
        Self {
            kernel,
            port: Some(port.into()),
        }
    }
}

impl KernelId {
    /// Refer to the port called `name` on this kernel.
    pub fn port(self, name: impl Into<String>) -> PortRef {
        PortRef::from((self, name))
    }
}

/// A link connecting an output port of one kernel to an input port of another.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub src: KernelId,
    pub src_port: String,
    pub dst: KernelId,
    pub dst_port: String,
    pub capacity: usize,
    pub payload: &'static str,
    src_index: usize,
    counters: Arc<LinkCounters>,
}

impl Edge {
    pub fn counters(&self) -> &Arc<LinkCounters> {
        &self.counters
    }
}

/// Handle returned by [`Map::link`]; chain further links off [`Link::dst`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    id: EdgeId,
    src: KernelId,
    src_port: String,
    dst: KernelId,
    dst_port: String,
}

impl Link {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn src(&self) -> KernelId {
        self.src
    }

    pub fn dst(&self) -> KernelId {
        self.dst
    }

    pub fn src_port(&self) -> &str {
        &self.src_port
    }

    pub fn dst_port(&self) -> &str {
        &self.dst_port
    }
}

/// A placed kernel, its declared ports, and the edge on each port.
pub(crate) struct KernelSlot {
    pub(crate) name: String,
    pub(crate) ports: Vec<PortDescriptor>,
    /// Parallel to `ports`.
    pub(crate) links: Vec<Option<EdgeId>>,
    /// Taken when execution starts.
    pub(crate) kernel: Option<Box<dyn Kernel>>,
}

/// The pipeline graph.
pub struct Map {
    kernels: Vec<KernelSlot>,
    edges: Vec<Edge>,
    default_capacity: usize,
    thread_name_prefix: String,
    started: bool,
}

impl Map {
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            kernels: Vec::new(),
            edges: Vec::new(),
            default_capacity: config.default_capacity.clamp(1, MAX_LINK_CAPACITY),
            thread_name_prefix: config.thread_name_prefix.clone(),
            started: false,
        }
    }

    // ── Graph building ──

    /// Place a kernel on the map. Returns its KernelId.
    pub fn add<K: Kernel + 'static>(&mut self, kernel: K) -> KernelId {
        let id = KernelId(self.kernels.len() as u32);
        let ports = kernel.ports();
        let name = kernel.name().to_string();
        tracing::debug!("Placed kernel '{}' as {} with {} ports", name, id, ports.len());
        self.kernels.push(KernelSlot {
            name,
            links: vec![None; ports.len()],
            ports,
            kernel: Some(Box::new(kernel)),
        });
        id
    }

    /// Place `kernel` and link `src` to it in one step.
    pub fn chain<K: Kernel + 'static>(
        &mut self,
        src: impl Into<PortRef>,
        kernel: K,
    ) -> PipelineResult<Link> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        let dst = self.add(kernel);
        self.link(src, dst)
    }

    /// Connect an output port of `src` to an input port of `dst` using the
    /// map's default capacity.
    pub fn link(&mut self, src: impl Into<PortRef>, dst: impl Into<PortRef>) -> PipelineResult<Link> {
        let capacity = self.default_capacity;
        self.link_with_capacity(src, dst, capacity)
    }

    /// Connect an output port of `src` to an input port of `dst` with room
    /// for `capacity` in-flight buffers.
    pub fn link_with_capacity(
        &mut self,
        src: impl Into<PortRef>,
        dst: impl Into<PortRef>,
        capacity: usize,
    ) -> PipelineResult<Link> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        if !(1..=MAX_LINK_CAPACITY).contains(&capacity) {
            return Err(PipelineError::InvalidCapacity);
        }

        let src = src.into();
        let dst = dst.into();
        if src.kernel == dst.kernel {
            return Err(PipelineError::SelfLoop(src.kernel));
        }

        let src_slot = self.slot(src.kernel)?;
        let dst_slot = self.slot(dst.kernel)?;

        let src_index = resolve_port(src_slot, src.port.as_deref(), PortDirection::Output, None)?;
        let src_desc = &src_slot.ports[src_index];
        let dst_index = resolve_port(
            dst_slot,
            dst.port.as_deref(),
            PortDirection::Input,
            Some(&*src_desc.name),
        )?;
        let dst_desc = &dst_slot.ports[dst_index];

        if !src_desc.same_payload(dst_desc) {
            return Err(PipelineError::PortTypeMismatch {
                name: dst_desc.name.to_string(),
                declared: dst_desc.payload,
                requested: src_desc.payload,
            });
        }
        for (slot, index) in [(src_slot, src_index), (dst_slot, dst_index)] {
            if slot.links[index].is_some() {
                return Err(PipelineError::PortAlreadyConnected {
                    kernel: slot.name.clone(),
                    port: slot.ports[index].name.to_string(),
                });
            }
        }

        let id = EdgeId(self.edges.len() as u32);
        let edge = Edge {
            id,
            src: src.kernel,
            src_port: src_desc.name.to_string(),
            dst: dst.kernel,
            dst_port: dst_desc.name.to_string(),
            capacity,
            payload: src_desc.payload,
            src_index,
            counters: Arc::new(LinkCounters::default()),
        };
        tracing::debug!(
            "Linked {}:'{}' -> {}:'{}' ({}, capacity {})",
            src_slot.name,
            edge.src_port,
            dst_slot.name,
            edge.dst_port,
            edge.payload,
            capacity
        );

        self.kernels[src.kernel.index()].links[src_index] = Some(id);
        self.kernels[dst.kernel.index()].links[dst_index] = Some(id);

        let link = Link {
            id,
            src: edge.src,
            src_port: edge.src_port.clone(),
            dst: edge.dst,
            dst_port: edge.dst_port.clone(),
        };
        self.edges.push(edge);
        Ok(link)
    }

    fn slot(&self, id: KernelId) -> PipelineResult<&KernelSlot> {
        self.kernels
            .get(id.index())
            .ok_or(PipelineError::UnknownKernel(id))
    }

    // ── Queries ──

    pub fn kernel_name(&self, id: KernelId) -> Option<&str> {
        self.kernels.get(id.index()).map(|slot| slot.name.as_str())
    }

    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Validate the graph and compute its execution order.
    pub fn plan(&self) -> PipelineResult<ExecutionPlan> {
        PlanCompiler::compile(&self.kernels, &self.edges)
    }

    /// Snapshot of kernels, ports and links.
    pub fn topology(&self) -> TopologySnapshot {
        TopologySnapshot {
            kernels: self
                .kernels
                .iter()
                .enumerate()
                .map(|(idx, slot)| KernelSnapshot {
                    id: KernelId(idx as u32),
                    name: slot.name.clone(),
                    ports: slot.ports.clone(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| EdgeSnapshot {
                    id: edge.id,
                    src: edge.src,
                    src_port: edge.src_port.clone(),
                    dst: edge.dst,
                    dst_port: edge.dst_port.clone(),
                    capacity: edge.capacity,
                    payload: edge.payload,
                    traffic: edge.counters.snapshot(),
                })
                .collect(),
        }
    }

    // ── Execution ──

    /// Validate the graph and start every kernel on its own thread.
    pub fn spawn(&mut self) -> PipelineResult<RunningMap> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        let plan = self.plan()?;

        tracing::info!(
            "Pipeline validated: {} kernels, {} links, {} sources, {} sinks ({} us)",
            plan.stats.total_kernels,
            plan.stats.total_edges,
            plan.stats.source_kernels,
            plan.stats.sink_kernels,
            plan.stats.compile_time_us,
        );

        self.started = true;

        let mut contexts: Vec<KernelContext> = (0..self.kernels.len())
            .map(|idx| KernelContext::new(KernelId(idx as u32)))
            .collect();

        for edge in &self.edges {
            let desc = &self.kernels[edge.src.index()].ports[edge.src_index];
            let (output, input) = desc.connect(edge.capacity, edge.counters.clone(), &edge.dst_port);
            contexts[edge.src.index()].outputs.attach(output);
            contexts[edge.dst.index()].inputs.attach(input);
        }

        let mut contexts: Vec<Option<KernelContext>> = contexts.into_iter().map(Some).collect();
        let mut tasks = Vec::with_capacity(plan.order.len());
        for id in &plan.order {
            let slot = &mut self.kernels[id.index()];
            if let (Some(kernel), Some(ctx)) = (slot.kernel.take(), contexts[id.index()].take()) {
                tasks.push(KernelTask {
                    id: *id,
                    name: slot.name.clone(),
                    kernel,
                    ctx,
                });
            }
        }

        let links = self
            .edges
            .iter()
            .map(|edge| (edge.id, edge.counters.clone()))
            .collect();

        Scheduler::new(self.thread_name_prefix.clone()).spawn(tasks, links)
    }

    /// Run the map to quiescence and report how each kernel finished.
    pub fn exe(&mut self) -> PipelineResult<RunReport> {
        Ok(self.spawn()?.join())
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the port a link should use on `slot`.
fn resolve_port(
    slot: &KernelSlot,
    explicit: Option<&str>,
    direction: PortDirection,
    same_name_as: Option<&str>,
) -> PipelineResult<usize> {
    if let Some(name) = explicit {
        return match slot.ports.iter().position(|p| p.name == name) {
            Some(idx) if slot.ports[idx].direction == direction => Ok(idx),
            Some(_) => Err(PipelineError::DirectionMismatch {
                name: name.to_string(),
                expected: direction.as_str(),
            }),
            None => Err(PipelineError::UnknownPort {
                direction: direction.as_str(),
                name: name.to_string(),
            }),
        };
    }

    let candidates: Vec<usize> = slot
        .ports
        .iter()
        .enumerate()
        .filter(|(_, p)| p.direction == direction)
        .map(|(idx, _)| idx)
        .collect();

    if let Some(name) = same_name_as {
        if let Some(&idx) = candidates
            .iter()
            .find(|&&idx| slot.ports[idx].name == name && slot.links[idx].is_none())
        {
            return Ok(idx);
        }
    }

    match candidates.as_slice() {
        [] => Err(PipelineError::MissingPort {
            kernel: slot.name.clone(),
            direction: direction.as_str(),
        }),
        [only] => Ok(*only),
        _ => {
            let open: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&idx| slot.links[idx].is_none())
                .collect();
            match open.as_slice() {
                [only] => Ok(*only),
                _ => Err(PipelineError::AmbiguousPort {
                    kernel: slot.name.clone(),
                    direction: direction.as_str(),
                    count: candidates.len(),
                }),
            }
        }
    }
}
