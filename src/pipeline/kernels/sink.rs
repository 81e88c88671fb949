//! Sink kernels: one input port, no outputs.

use crate::pipeline::buffer::Payload;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::kernel::{Kernel, KernelContext, KernelStatus};
use crate::pipeline::kernels::ThroughputMeter;
use crate::pipeline::port::{PortDescriptor, DEFAULT_PORT};
use crossbeam_channel::Sender;
use std::marker::PhantomData;

/// Calls `f(&item)` for each buffer, then recycles it.
pub struct ForEachSink<T, F> {
    name: String,
    f: F,
    meter: Option<ThroughputMeter>,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> ForEachSink<T, F>
where
    T: Payload,
    F: FnMut(&T) + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            meter: None,
            _payload: PhantomData,
        }
    }

    /// Sample throughput every `interval` items.
    pub fn with_meter(mut self, interval: u64) -> Self {
        self.meter = Some(ThroughputMeter::new(self.name.clone(), interval));
        self
    }
}

impl<T, F> Kernel for ForEachSink<T, F>
where
    T: Payload,
    F: FnMut(&T) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::input::<T>(DEFAULT_PORT)]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(item) = ctx.inputs.peek_buffer::<T>(DEFAULT_PORT)? else {
            return Ok(KernelStatus::Stop);
        };
        (self.f)(&item);
        drop(item);
        if let Some(meter) = &mut self.meter {
            meter.record();
        }
        Ok(KernelStatus::Proceed)
    }

    fn on_stop(&mut self) {
        if let Some(meter) = &self.meter {
            tracing::info!(
                "'{}' consumed {} items ({:.1} items/s overall)",
                self.name,
                meter.count(),
                meter.overall_rate().unwrap_or(0.0)
            );
        }
    }
}

/// Moves each payload into a channel.
///
/// Stops early if the receiving side is dropped.
pub struct CollectSink<T> {
    name: String,
    tx: Sender<T>,
}

impl<T: Payload> CollectSink<T> {
    pub fn new(tx: Sender<T>) -> Self {
        Self {
            name: "Collect".to_string(),
            tx,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Payload> Kernel for CollectSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::input::<T>(DEFAULT_PORT)]
    }

    fn run(&mut self, ctx: &mut KernelContext) -> PipelineResult<KernelStatus> {
        let Some(mut item) = ctx.inputs.peek_buffer::<T>(DEFAULT_PORT)? else {
            return Ok(KernelStatus::Stop);
        };
        // The link gets a default value back in place of the moved payload.
        let value = std::mem::take(&mut *item);
        drop(item);
        if self.tx.send(value).is_err() {
            tracing::debug!("'{}' receiver dropped; stopping", self.name);
            return Ok(KernelStatus::Stop);
        }
        Ok(KernelStatus::Proceed)
    }
}
