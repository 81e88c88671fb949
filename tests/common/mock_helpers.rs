//! Misbehaving and multi-port kernels for integration tests

use crossbeam_channel::Receiver;
use kernelflow_rs::pipeline::{
    Kernel, KernelContext, KernelStatus, PipelineError, PipelineResult, PortDescriptor,
    DEFAULT_PORT,
};

/// Holds the first buffer without recycling until `gate` fires, then
/// consumes normally.
pub struct GateSink {
    gate: Receiver<()>,
    opened: bool,
    pub consumed: u64,
}

impl GateSink {
    pub fn new(gate: Receiver<()>) -> Self {
        Self {
            gate,
            opened: false,
            consumed: 0,
        }
    }
}

impl Kernel for GateSink {
    fn name(&self) -> &str {
        "Gate"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::input::<u64>(DEFAULT_PORT)]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        if ctx.inputs.peek::<u64>(DEFAULT_PORT)?.is_none() {
            return Ok(KernelStatus::Stop);
        }
        if !self.opened {
            let _ = self.gate.recv();
            self.opened = true;
        }
        ctx.inputs.recycle(DEFAULT_PORT)?;
        self.consumed += 1;
        Ok(KernelStatus::Proceed)
    }
}

/// Passes values through until it sees `limit`, then fails.
pub struct FailAt {
    pub limit: u64,
}

impl Kernel for FailAt {
    fn name(&self) -> &str {
        "FailAt"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<u64>(DEFAULT_PORT),
            PortDescriptor::output::<u64>(DEFAULT_PORT),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let kernel = ctx.kernel_id();
        let Some(value) = ctx.inputs.peek_buffer::<u64>(DEFAULT_PORT)? else {
            return Ok(KernelStatus::Stop);
        };
        if *value == self.limit {
            return Err(PipelineError::Kernel {
                kernel,
                message: format!("refusing {}", *value),
            });
        }
        *ctx.outputs.allocate::<u64>(DEFAULT_PORT)? = *value;
        ctx.outputs.send(DEFAULT_PORT)?;
        Ok(KernelStatus::Proceed)
    }
}

/// Passes values through until it sees `limit`, then panics.
pub struct PanicAt {
    pub limit: u64,
}

impl Kernel for PanicAt {
    fn name(&self) -> &str {
        "PanicAt"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<u64>(DEFAULT_PORT),
            PortDescriptor::output::<u64>(DEFAULT_PORT),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(value) = ctx.inputs.peek_buffer::<u64>(DEFAULT_PORT)? else {
            return Ok(KernelStatus::Stop);
        };
        if *value == self.limit {
            panic!("PanicAt hit {}", self.limit);
        }
        *ctx.outputs.allocate::<u64>(DEFAULT_PORT)? = *value;
        ctx.outputs.send(DEFAULT_PORT)?;
        Ok(KernelStatus::Proceed)
    }
}

/// Routes even values to "even" and odd values to "odd".
pub struct Splitter;

impl Kernel for Splitter {
    fn name(&self) -> &str {
        "Splitter"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<u64>(DEFAULT_PORT),
            PortDescriptor::output::<u64>("even"),
            PortDescriptor::output::<u64>("odd"),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(value) = ctx.inputs.peek_buffer::<u64>(DEFAULT_PORT)? else {
            return Ok(KernelStatus::Stop);
        };
        let port = if *value % 2 == 0 { "even" } else { "odd" };
        let mut out = ctx.outputs.allocate_buffer::<u64>(port)?;
        *out = *value;
        drop(value);
        out.send()?;
        Ok(KernelStatus::Proceed)
    }
}

/// Reads "even" and "odd" alternately, draining whichever outlives the other.
#[derive(Default)]
pub struct Merger {
    done: [bool; 2],
    turn: usize,
}

impl Merger {
    const INPUTS: [&'static str; 2] = ["even", "odd"];
}

impl Kernel for Merger {
    fn name(&self) -> &str {
        "Merger"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<u64>("even"),
            PortDescriptor::input::<u64>("odd"),
            PortDescriptor::output::<u64>(DEFAULT_PORT),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        for _ in 0..2 {
            let idx = self.turn;
            self.turn = 1 - self.turn;
            if self.done[idx] {
                continue;
            }
            match ctx.inputs.peek_buffer::<u64>(Self::INPUTS[idx])? {
                None => self.done[idx] = true,
                Some(value) => {
                    *ctx.outputs.allocate::<u64>(DEFAULT_PORT)? = *value;
                    drop(value);
                    ctx.outputs.send(DEFAULT_PORT)?;
                    return Ok(KernelStatus::Proceed);
                }
            }
        }
        if self.done.iter().all(|&d| d) {
            Ok(KernelStatus::Stop)
        } else {
            Ok(KernelStatus::Proceed)
        }
    }
}

/// Adds the heads of "even" and "odd" pairwise; stops when either side ends.
pub struct Zip;

impl Kernel for Zip {
    fn name(&self) -> &str {
        "Zip"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<u64>("even"),
            PortDescriptor::input::<u64>("odd"),
            PortDescriptor::output::<u64>(DEFAULT_PORT),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let (even, odd) = ctx.inputs.pair::<u64, u64>("even", "odd")?;
        let (Some(a), Some(b)) = (even.peek_buffer(), odd.peek_buffer()) else {
            return Ok(KernelStatus::Stop);
        };
        *ctx.outputs.allocate::<u64>(DEFAULT_PORT)? = *a + *b;
        drop((a, b));
        ctx.outputs.send(DEFAULT_PORT)?;
        Ok(KernelStatus::Proceed)
    }
}
