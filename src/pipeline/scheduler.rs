//! Pipeline scheduler: one OS thread per kernel.
//!
//! Each kernel thread:
//! 1. Calls `on_start`.
//! 2. Calls `run` until it returns `Stop` or an error.
//! 3. Discards any allocation left unsent after each call.
//! 4. Drops its ports, which ends the stream for every consumer and wakes
//!    any producer still blocked on a send into this kernel.
//! 5. Calls `on_stop`.
//!
//! Kernels coordinate only through their links. The map has quiesced once
//! every kernel thread has exited.

use crate::pipeline::buffer::{LinkCounters, LinkTraffic};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, KernelId};
use crate::pipeline::kernel::{Kernel, KernelContext, KernelStatus};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A kernel ready to run, with its ports attached.
pub(crate) struct KernelTask {
    pub(crate) id: KernelId,
    pub(crate) name: String,
    pub(crate) kernel: Box<dyn Kernel>,
    pub(crate) ctx: KernelContext,
}

/// How a kernel's thread ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum KernelOutcome {
    /// Returned `Stop`, or its consumer went away.
    Stopped,
    /// `run` returned an error.
    Failed(String),
    /// `run` panicked.
    Panicked(String),
}

/// Per-kernel result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct KernelReport {
    pub id: KernelId,
    pub name: String,
    pub invocations: u64,
    pub outcome: KernelOutcome,
    pub elapsed: Duration,
}

/// Per-link traffic at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub id: EdgeId,
    pub traffic: LinkTraffic,
}

/// Result of running a map to quiescence.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kernels: Vec<KernelReport>,
    pub links: Vec<LinkReport>,
    pub elapsed: Duration,
}

impl RunReport {
    /// True if every kernel stopped on its own.
    pub fn is_clean(&self) -> bool {
        self.kernels
            .iter()
            .all(|k| k.outcome == KernelOutcome::Stopped)
    }

    pub fn kernel(&self, id: KernelId) -> Option<&KernelReport> {
        self.kernels.iter().find(|k| k.id == id)
    }

    pub fn link(&self, id: EdgeId) -> Option<&LinkReport> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Kernels that failed or panicked.
    pub fn failures(&self) -> impl Iterator<Item = &KernelReport> {
        self.kernels
            .iter()
            .filter(|k| k.outcome != KernelOutcome::Stopped)
    }
}

/// What a kernel thread hands back when it exits normally.
struct KernelRun {
    outcome: KernelOutcome,
    elapsed: Duration,
}

/// Sent once per kernel thread as it exits, normally or by unwinding.
struct KernelExit {
    id: KernelId,
    elapsed: Duration,
}

struct KernelHandle {
    id: KernelId,
    name: String,
    invocations: Arc<AtomicU64>,
    handle: JoinHandle<KernelRun>,
}

/// Reports a kernel's exit to the `RunningMap`, including during unwinding.
/// Created as the thread starts, so the elapsed time covers the whole run.
struct ExitNotice {
    id: KernelId,
    started: Instant,
    tx: Sender<KernelExit>,
}

impl ExitNotice {
    fn new(id: KernelId, tx: Sender<KernelExit>) -> Self {
        Self {
            id,
            started: Instant::now(),
            tx,
        }
    }
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(KernelExit {
            id: self.id,
            elapsed: self.started.elapsed(),
        });
    }
}

/// Starts kernel threads.
pub struct Scheduler {
    thread_name_prefix: String,
}

impl Scheduler {
    pub fn new(thread_name_prefix: impl Into<String>) -> Self {
        Self {
            thread_name_prefix: thread_name_prefix.into(),
        }
    }

    /// Spawn one named thread per task.
    ///
    /// If a spawn fails, the tasks not yet started are dropped; their links
    /// close, so the kernels already running wind down on their own.
    pub(crate) fn spawn(
        &self,
        tasks: Vec<KernelTask>,
        links: Vec<(EdgeId, Arc<LinkCounters>)>,
    ) -> PipelineResult<RunningMap> {
        let (exit_tx, exit_rx) = unbounded();
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = task.id;
            let name = task.name.clone();
            let invocations = Arc::new(AtomicU64::new(0));
            let counter = invocations.clone();
            let exit_tx = exit_tx.clone();

            let handle = thread::Builder::new()
                .name(format!("{}-{}-{}", self.thread_name_prefix, id.0, name))
                .spawn(move || {
                    let _notice = ExitNotice::new(id, exit_tx);
                    drive(task, &counter)
                })
                .map_err(|e| {
                    tracing::error!("Failed to spawn thread for kernel '{}': {}", name, e);
                    PipelineError::Spawn(e.to_string())
                })?;

            handles.push(KernelHandle {
                id,
                name,
                invocations,
                handle,
            });
        }

        tracing::info!("Pipeline running: {} kernel threads", handles.len());

        Ok(RunningMap {
            remaining: handles.len(),
            handles,
            exits: exit_rx,
            exit_times: HashMap::new(),
            links,
            started: Instant::now(),
        })
    }
}

/// The body of a kernel thread.
fn drive(task: KernelTask, invocations: &AtomicU64) -> KernelRun {
    let KernelTask {
        id,
        name,
        mut kernel,
        mut ctx,
    } = task;
    let span = tracing::info_span!("kernel", id = id.0, name = %name);
    let _entered = span.enter();

    let started = Instant::now();
    kernel.on_start();
    tracing::debug!("Kernel started");

    let outcome = loop {
        // Counted before the call so a panicking call is included.
        invocations.store(ctx.invocation() + 1, Ordering::Relaxed);
        let result = kernel.run(&mut ctx);
        ctx.advance();

        let abandoned = ctx.outputs.discard_pending();
        if !abandoned.is_empty() {
            tracing::warn!(
                "Kernel '{}' returned with unsent buffers on {:?}; discarded",
                name,
                abandoned
            );
        }

        match result {
            Ok(KernelStatus::Proceed) => {}
            Ok(KernelStatus::Stop) => break KernelOutcome::Stopped,
            Err(e) if e.is_peer_closed() => {
                tracing::debug!("Kernel '{}' stopping: {}", name, e);
                break KernelOutcome::Stopped;
            }
            Err(e) => {
                tracing::error!("Kernel '{}' failed: {}", name, e);
                break KernelOutcome::Failed(e.to_string());
            }
        }
    };

    // Closing the ports is what lets the rest of the map drain.
    drop(ctx);
    kernel.on_stop();

    let elapsed = started.elapsed();
    tracing::debug!(
        "Kernel stopped after {} invocations in {:?}",
        invocations.load(Ordering::Relaxed),
        elapsed
    );
    KernelRun { outcome, elapsed }
}

/// Handle to a map whose kernels are running.
pub struct RunningMap {
    handles: Vec<KernelHandle>,
    exits: Receiver<KernelExit>,
    exit_times: HashMap<KernelId, Duration>,
    remaining: usize,
    links: Vec<(EdgeId, Arc<LinkCounters>)>,
    started: Instant,
}

impl RunningMap {
    /// Kernels whose threads are still alive.
    pub fn running(&mut self) -> usize {
        while let Ok(exit) = self.exits.try_recv() {
            self.record(exit);
        }
        self.remaining
    }

    fn record(&mut self, exit: KernelExit) {
        self.exit_times.insert(exit.id, exit.elapsed);
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn is_finished(&mut self) -> bool {
        self.running() == 0
    }

    /// Wait until every kernel has exited or `timeout` passes. Returns true
    /// if the map quiesced in time.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.remaining > 0 {
            match self.exits.recv_deadline(deadline) {
                Ok(exit) => self.record(exit),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.remaining = 0;
                }
            }
        }
        true
    }

    /// Live `run` counts per kernel.
    pub fn invocations(&self) -> Vec<(KernelId, u64)> {
        self.handles
            .iter()
            .map(|h| (h.id, h.invocations.load(Ordering::Relaxed)))
            .collect()
    }

    /// Wait for every kernel thread and collect the run report.
    pub fn join(mut self) -> RunReport {
        let handles = std::mem::take(&mut self.handles);
        let mut joined = Vec::with_capacity(handles.len());
        for KernelHandle {
            id,
            name,
            invocations,
            handle,
        } in handles
        {
            joined.push((id, name, invocations, handle.join()));
        }

        // Every thread has exited, so every exit notice is queued.
        while let Ok(exit) = self.exits.try_recv() {
            self.record(exit);
        }

        let mut kernels = Vec::with_capacity(joined.len());
        for (id, name, invocations, result) in joined {
            let (outcome, elapsed) = match result {
                Ok(run) => (run.outcome, run.elapsed),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!("Kernel '{}' panicked: {}", name, message);
                    let elapsed = self.exit_times.get(&id).copied().unwrap_or_default();
                    (KernelOutcome::Panicked(message), elapsed)
                }
            };
            kernels.push(KernelReport {
                id,
                name,
                invocations: invocations.load(Ordering::Relaxed),
                outcome,
                elapsed,
            });
        }

        let links = self
            .links
            .iter()
            .map(|(id, counters)| LinkReport {
                id: *id,
                traffic: counters.snapshot(),
            })
            .collect();

        let report = RunReport {
            kernels,
            links,
            elapsed: self.started.elapsed(),
        };

        tracing::info!(
            "Pipeline quiesced in {:?}: {} kernels, {} failed",
            report.elapsed,
            report.kernels.len(),
            report.failures().count()
        );
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::map::Map;
    use crate::pipeline::port::{PortDescriptor, DEFAULT_PORT};

    /// Emits `0..count` then stops.
    struct Counter {
        next: u32,
        count: u32,
    }

    impl Kernel for Counter {
        fn name(&self) -> &str {
            "Counter"
        }

        fn ports(&self) -> Vec<PortDescriptor> {
            vec![PortDescriptor::output::<u32>(DEFAULT_PORT)]
        }

        fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
            if self.next == self.count {
                return Ok(KernelStatus::Stop);
            }
            *ctx.outputs.allocate::<u32>(DEFAULT_PORT)? = self.next;
            ctx.outputs.send(DEFAULT_PORT)?;
            self.next += 1;
            Ok(KernelStatus::Proceed)
        }
    }

    /// Consumes until end-of-stream, optionally misbehaving on one value.
    struct Drain {
        fail_on: Option<u32>,
        panic_on: Option<u32>,
    }

    impl Kernel for Drain {
        fn name(&self) -> &str {
            "Drain"
        }

        fn ports(&self) -> Vec<PortDescriptor> {
            vec![PortDescriptor::input::<u32>(DEFAULT_PORT)]
        }

        fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
            let Some(value) = ctx.inputs.peek::<u32>(DEFAULT_PORT)?.copied() else {
                return Ok(KernelStatus::Stop);
            };
            if Some(value) == self.panic_on {
                panic!("bad value {}", value);
            }
            if Some(value) == self.fail_on {
                // Recycling twice is a protocol error.
                ctx.inputs.recycle(DEFAULT_PORT)?;
            }
            ctx.inputs.recycle(DEFAULT_PORT)?;
            Ok(KernelStatus::Proceed)
        }
    }

    fn run(count: u32, drain: Drain) -> RunReport {
        let mut map = Map::new();
        let src = map.add(Counter { next: 0, count });
        let dst = map.add(drain);
        map.link_with_capacity(src, dst, 1).unwrap();
        let mut running = map.spawn().unwrap();
        assert!(running.wait_timeout(Duration::from_secs(10)), "map did not quiesce");
        running.join()
    }

    #[test]
    fn test_clean_run_reports_invocations() {
        let report = run(
            5,
            Drain {
                fail_on: None,
                panic_on: None,
            },
        );
        assert!(report.is_clean());
        // Five sends plus the call that returns Stop.
        assert_eq!(report.kernel(KernelId(0)).unwrap().invocations, 6);
        // Five values plus the call that sees end-of-stream.
        assert_eq!(report.kernel(KernelId(1)).unwrap().invocations, 6);
        assert_eq!(report.link(EdgeId(0)).unwrap().traffic.sent, 5);
        assert_eq!(report.link(EdgeId(0)).unwrap().traffic.recycled, 5);
    }

    #[test]
    fn test_failed_consumer_stops_producer() {
        let report = run(
            1000,
            Drain {
                fail_on: Some(3),
                panic_on: None,
            },
        );
        assert!(!report.is_clean());
        let drain = report.kernel(KernelId(1)).unwrap();
        assert!(matches!(drain.outcome, KernelOutcome::Failed(ref m) if m.contains("recycle")));
        // The producer sees its consumer gone and stops cleanly.
        assert_eq!(
            report.kernel(KernelId(0)).unwrap().outcome,
            KernelOutcome::Stopped
        );
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_panicking_kernel_is_reported() {
        let report = run(
            100,
            Drain {
                fail_on: None,
                panic_on: Some(2),
            },
        );
        let drain = report.kernel(KernelId(1)).unwrap();
        assert!(matches!(drain.outcome, KernelOutcome::Panicked(ref m) if m.contains("bad value 2")));
        // Values 0 and 1, then the call that panicked.
        assert_eq!(drain.invocations, 3);
        assert!(drain.elapsed > Duration::ZERO);
        assert_eq!(
            report.kernel(KernelId(0)).unwrap().outcome,
            KernelOutcome::Stopped
        );
    }

    /// Emits `0..count`, allocating a throwaway buffer without sending it
    /// on every odd call.
    struct Flaky {
        calls: u32,
        count: u32,
    }

    impl Kernel for Flaky {
        fn name(&self) -> &str {
            "Flaky"
        }

        fn ports(&self) -> Vec<PortDescriptor> {
            vec![PortDescriptor::output::<u32>(DEFAULT_PORT)]
        }

        fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
            let call = self.calls;
            self.calls += 1;
            if call == self.count {
                return Ok(KernelStatus::Stop);
            }
            *ctx.outputs.allocate::<u32>(DEFAULT_PORT)? = if call % 2 == 0 { call } else { 999 };
            if call % 2 == 0 {
                ctx.outputs.send(DEFAULT_PORT)?;
            }
            Ok(KernelStatus::Proceed)
        }
    }

    #[test]
    fn test_unsent_allocation_is_discarded() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut map = Map::new();
        let src = map.add(Flaky { calls: 0, count: 6 });
        let link = map
            .chain(src, crate::pipeline::CollectSink::new(tx))
            .unwrap();

        let report = map.exe().unwrap();
        assert!(report.is_clean());
        assert_eq!(rx.try_iter().collect::<Vec<u32>>(), vec![0, 2, 4]);
        assert_eq!(report.link(link.id()).unwrap().traffic.sent, 3);
        // Six calls that allocate plus the one that stops.
        assert_eq!(report.kernel(src).unwrap().invocations, 7);
    }

    #[test]
    fn test_report_serializes() {
        let report = run(
            2,
            Drain {
                fail_on: None,
                panic_on: None,
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kernels"][0]["outcome"]["state"], "stopped");
        assert_eq!(json["links"][0]["traffic"]["sent"], 2);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
