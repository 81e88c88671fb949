//! Source kernels: no inputs, one output port.

use crate::pipeline::buffer::Payload;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::kernel::{Kernel, KernelContext, KernelStatus};
use crate::pipeline::port::{PortDescriptor, DEFAULT_PORT};
use std::marker::PhantomData;

/// Emits every item of an iterator, then stops.
pub struct IterSource<I> {
    name: String,
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator + Send,
    I::Item: Payload,
{
    pub fn new(name: impl Into<String>, items: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            name: name.into(),
            iter: items.into_iter(),
        }
    }
}

impl<I> Kernel for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Payload,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::output::<I::Item>(DEFAULT_PORT)]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(item) = self.iter.next() else {
            return Ok(KernelStatus::Stop);
        };
        *ctx.outputs.allocate::<I::Item>(DEFAULT_PORT)? = item;
        ctx.outputs.send(DEFAULT_PORT)?;
        Ok(KernelStatus::Proceed)
    }
}

/// An external device that fills buffers one item at a time.
#[cfg_attr(test, mockall::automock)]
pub trait Capture<T: Send + 'static>: Send {
    /// Whether the device was acquired and can produce.
    fn is_open(&self) -> bool;

    /// Fill `frame` with the next item. Returns false once exhausted.
    fn read(&mut self, frame: &mut T) -> bool;
}

/// Adapts a [`Capture`] device into a source kernel.
///
/// Reads straight into the link's recycled storage, so a device that
/// reuses its frame allocation never allocates after warm-up.
pub struct CaptureSource<C, T> {
    name: String,
    capture: C,
    frames: u64,
    _payload: PhantomData<fn() -> T>,
}

impl<C, T> CaptureSource<C, T>
where
    C: Capture<T>,
    T: Payload,
{
    /// Fails with [`PipelineError::ResourceUnavailable`] if the device is
    /// not open.
    pub fn new(capture: C) -> PipelineResult<Self> {
        if !capture.is_open() {
            return Err(PipelineError::ResourceUnavailable(
                "capture device is not open".to_string(),
            ));
        }
        Ok(Self {
            name: "CaptureSource".to_string(),
            capture,
            frames: 0,
            _payload: PhantomData,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Frames captured so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<C, T> Kernel for CaptureSource<C, T>
where
    C: Capture<T>,
    T: Payload,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::output::<T>(DEFAULT_PORT)]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let mut frame = ctx.outputs.allocate_buffer::<T>(DEFAULT_PORT)?;
        if !self.capture.read(&mut frame) {
            tracing::debug!("'{}' exhausted after {} frames", self.name, self.frames);
            return Ok(KernelStatus::Stop);
        }
        frame.send()?;
        self.frames += 1;
        Ok(KernelStatus::Proceed)
    }

    fn on_stop(&mut self) {
        tracing::info!("'{}' captured {} frames", self.name, self.frames);
    }
}
