//! Kernel abstraction for the pipeline.
//!
//! A kernel is one stage of the graph. It declares its ports once via
//! [`Kernel::ports`], then the scheduler calls [`Kernel::run`] on the
//! kernel's own thread until it returns [`KernelStatus::Stop`] or an error.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::KernelId;
use crate::pipeline::port::{Inputs, Outputs, PortDescriptor};

/// What a kernel wants after one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStatus {
    /// Call `run` again.
    Proceed,
    /// No more work, ever. Outputs end once their queued buffers drain.
    Stop,
}

/// Context passed to [`Kernel::run`] on every invocation.
///
/// `inputs` and `outputs` are separate fields so a kernel can hold a peeked
/// input and an allocated output at the same time.
pub struct KernelContext {
    pub inputs: Inputs,
    pub outputs: Outputs,
    id: KernelId,
    invocation: u64,
}

impl KernelContext {
    pub(crate) fn new(id: KernelId) -> Self {
        Self {
            inputs: Inputs::default(),
            outputs: Outputs::default(),
            id,
            invocation: 0,
        }
    }

    /// The id this kernel was placed under.
    pub fn kernel_id(&self) -> KernelId {
        self.id
    }

    /// Zero-based count of `run` calls before this one.
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    pub(crate) fn advance(&mut self) {
        self.invocation += 1;
    }
}

/// A unit of computation in the map.
pub trait Kernel: Send {
    /// Human-readable name of this kernel.
    fn name(&self) -> &str;

    /// Port descriptors for this kernel. Read once, when the kernel is
    /// placed on a map; the set must not change afterwards.
    fn ports(&self) -> Vec<PortDescriptor>;

    /// Called on the kernel's thread before the first `run`.
    fn on_start(&mut self) {}

    /// Perform at most one unit of work.
    ///
    /// An `Err` is fatal to this kernel: the scheduler stops calling it and
    /// closes its ports. [`PipelineError::PeerClosed`] is the exception that
    /// counts as an ordinary stop.
    ///
    /// [`PipelineError::PeerClosed`]: crate::pipeline::PipelineError::PeerClosed
    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus>;

    /// Called on the kernel's thread after the last `run`, once its ports
    /// have been closed.
    fn on_stop(&mut self) {}
}

impl<K: Kernel + ?Sized> Kernel for Box<K> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        (**self).ports()
    }

    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        (**self).run(ctx)
    }

    fn on_stop(&mut self) {
        (**self).on_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::port::DEFAULT_PORT;

    struct Countdown(u32);

    impl Kernel for Countdown {
        fn name(&self) -> &str {
            "Countdown"
        }

        fn ports(&self) -> Vec<PortDescriptor> {
            vec![PortDescriptor::output::<u32>(DEFAULT_PORT)]
        }

        fn run(&mut self, _ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
            if self.0 == 0 {
                return Ok(KernelStatus::Stop);
            }
            self.0 -= 1;
            Ok(KernelStatus::Proceed)
        }
    }

    #[test]
    fn test_boxed_kernel_forwards() {
        let mut kernel: Box<dyn Kernel> = Box::new(Countdown(1));
        let mut ctx = KernelContext::new(KernelId(0));
        assert_eq!(kernel.name(), "Countdown");
        assert_eq!(kernel.ports().len(), 1);
        assert_eq!(kernel.run(&mut ctx).unwrap(), KernelStatus::Proceed);
        assert_eq!(kernel.run(&mut ctx).unwrap(), KernelStatus::Stop);
    }

    #[test]
    fn test_context_counts_invocations() {
        let mut ctx = KernelContext::new(KernelId(3));
        assert_eq!(ctx.kernel_id(), KernelId(3));
        assert_eq!(ctx.invocation(), 0);
        ctx.advance();
        ctx.advance();
        assert_eq!(ctx.invocation(), 2);
        assert!(ctx.inputs.is_empty());
        assert!(ctx.outputs.is_empty());
    }
}
