//! Transform kernel: one input, one output, a function in between.

use crate::pipeline::buffer::Payload;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::kernel::{Kernel, KernelContext, KernelStatus};
use crate::pipeline::port::{PortDescriptor, DEFAULT_PORT};
use std::marker::PhantomData;

/// Applies `f(&input, &mut output)` to each buffer.
///
/// The output is written into recycled link storage, so `f` should
/// overwrite every field it relies on.
pub struct Transform<I, O, F> {
    name: String,
    f: F,
    _payload: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> Transform<I, O, F>
where
    I: Payload,
    O: Payload,
    F: FnMut(&I, &mut O) + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _payload: PhantomData,
        }
    }
}

impl<I, O, F> Kernel for Transform<I, O, F>
where
    I: Payload,
    O: Payload,
    F: FnMut(&I, &mut O) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input::<I>(DEFAULT_PORT),
            PortDescriptor::output::<O>(DEFAULT_PORT),
        ]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(input) = ctx.inputs.peek_buffer::<I>(DEFAULT_PORT)? else {
            tracing::debug!("'{}' reached end of stream", self.name);
            return Ok(KernelStatus::Stop);
        };
        let mut output = ctx.outputs.allocate_buffer::<O>(DEFAULT_PORT)?;
        (self.f)(&input, &mut output);
        // Hand the input back before a possibly blocking send.
        input.recycle();
        output.send()?;
        Ok(KernelStatus::Proceed)
    }
}
