//! Ports: typed endpoints of a link, and the buffer lifecycle API kernels
//! call during `run`.
//!
//! Each kernel declares its ports via [`PortDescriptor`]s. The map uses
//! these to validate links and, when execution starts, to build a typed
//! link per edge. A running kernel reaches its ports by name through
//! [`Inputs`] and [`Outputs`]:
//!
//! - `Outputs::allocate` / `Outputs::send`: producer lifecycle
//! - `Inputs::peek` / `Inputs::recycle`: consumer lifecycle
//!
//! The guard forms, [`InputBuffer`] and [`OutputBuffer`], tie the lifecycle
//! to ownership: dropping an `InputBuffer` recycles it, and an
//! `OutputBuffer` is published only by consuming it with `send`.

use crate::pipeline::buffer::{bounded_link, LinkCounters, LinkRx, LinkTx, Payload, TrySend};
use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Port name used by the built-in kernels.
pub const DEFAULT_PORT: &str = "0";

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds both halves of a typed link for one edge.
type Connector = fn(usize, Arc<LinkCounters>, &str, &str) -> (Box<dyn AnyOutput>, Box<dyn AnyInput>);

/// Descriptor for one of a kernel's ports.
#[derive(Clone, Serialize)]
pub struct PortDescriptor {
    pub name: Cow<'static, str>,
    pub direction: PortDirection,
    /// Payload type name, for diagnostics.
    pub payload: &'static str,
    #[serde(skip)]
    type_id: TypeId,
    #[serde(skip)]
    connector: Connector,
}

impl PortDescriptor {
    pub fn input<T: Payload>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new::<T>(name.into(), PortDirection::Input)
    }

    pub fn output<T: Payload>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new::<T>(name.into(), PortDirection::Output)
    }

    fn new<T: Payload>(name: Cow<'static, str>, direction: PortDirection) -> Self {
        Self {
            name,
            direction,
            payload: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            connector: connect::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether two ports carry the same payload type.
    pub fn same_payload(&self, other: &PortDescriptor) -> bool {
        self.type_id == other.type_id
    }

    pub(crate) fn connect(
        &self,
        capacity: usize,
        counters: Arc<LinkCounters>,
        dst_name: &str,
    ) -> (Box<dyn AnyOutput>, Box<dyn AnyInput>) {
        (self.connector)(capacity, counters, &self.name, dst_name)
    }
}

impl fmt::Debug for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortDescriptor")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("payload", &self.payload)
            .finish()
    }
}

fn connect<T: Payload>(
    capacity: usize,
    counters: Arc<LinkCounters>,
    src_name: &str,
    dst_name: &str,
) -> (Box<dyn AnyOutput>, Box<dyn AnyInput>) {
    let (tx, rx) = bounded_link::<T>(capacity, counters);
    (
        Box::new(OutputPort::new(src_name, tx)),
        Box::new(InputPort::new(dst_name, rx)),
    )
}

// ── Typed ports ──

/// Consumer end of a link, as seen by the kernel that owns it.
pub struct InputPort<T> {
    name: String,
    rx: LinkRx<T>,
}

impl<T: Payload> InputPort<T> {
    fn new(name: &str, rx: LinkRx<T>) -> Self {
        Self {
            name: name.to_string(),
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the oldest undelivered buffer, blocking this kernel until one
    /// arrives. Returns `None` at end-of-stream. Repeated calls without a
    /// `recycle` return the same buffer.
    pub fn peek(&mut self) -> Option<&mut T> {
        self.rx.peek()
    }

    /// Release the peeked buffer back to the link.
    pub fn recycle(&mut self) -> PipelineResult<()> {
        if self.rx.recycle() {
            Ok(())
        } else {
            Err(PipelineError::RecycleWithoutPeek(self.name.clone()))
        }
    }

    /// Take the oldest buffer as a guard that recycles on drop.
    pub fn peek_buffer(&mut self) -> Option<InputBuffer<'_, T>> {
        self.rx.peek()?;
        let value = self.rx.take_head()?;
        Some(InputBuffer {
            value,
            rx: &mut self.rx,
        })
    }

    /// Buffers waiting behind the current one.
    pub fn queued(&self) -> usize {
        self.rx.queued()
    }
}

/// Producer end of a link, as seen by the kernel that owns it.
pub struct OutputPort<T> {
    name: String,
    tx: LinkTx<T>,
    pending: Option<T>,
}

impl<T: Payload> OutputPort<T> {
    fn new(name: &str, tx: LinkTx<T>) -> Self {
        Self {
            name: name.to_string(),
            tx,
            pending: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtain storage for the next buffer. Contents are whatever the
    /// storage last held; the caller overwrites them before `send`.
    pub fn allocate(&mut self) -> PipelineResult<&mut T> {
        if self.pending.is_some() {
            return Err(PipelineError::AllocateOutstanding(self.name.clone()));
        }
        let storage = self.tx.take_storage();
        Ok(self.pending.insert(storage))
    }

    /// Publish the allocated buffer, blocking while the link is full.
    pub fn send(&mut self) -> PipelineResult<()> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| PipelineError::SendWithoutAllocate(self.name.clone()))?;
        self.tx
            .send(value)
            .map_err(|_| PipelineError::PeerClosed(self.name.clone()))
    }

    /// Publish the allocated buffer only if the link has room. Returns
    /// `Ok(false)` and keeps the allocation pending when it does not.
    pub fn try_send(&mut self) -> PipelineResult<bool> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| PipelineError::SendWithoutAllocate(self.name.clone()))?;
        match self.tx.try_send(value) {
            Ok(TrySend::Sent) => Ok(true),
            Ok(TrySend::Full(value)) => {
                self.pending = Some(value);
                Ok(false)
            }
            Err(_) => Err(PipelineError::PeerClosed(self.name.clone())),
        }
    }

    /// Obtain storage as a guard that is published by [`OutputBuffer::send`].
    pub fn allocate_buffer(&mut self) -> PipelineResult<OutputBuffer<'_, T>> {
        if self.pending.is_some() {
            return Err(PipelineError::AllocateOutstanding(self.name.clone()));
        }
        let value = self.tx.take_storage();
        Ok(OutputBuffer {
            value,
            port: self,
            sent: false,
        })
    }

    /// Buffers sent on this port and not yet recycled downstream.
    pub fn in_flight(&self) -> usize {
        self.tx.in_flight()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

// ── Ownership-typed buffer guards ──

/// A peeked buffer whose drop is the recycle operation.
pub struct InputBuffer<'a, T: Payload> {
    value: T,
    rx: &'a mut LinkRx<T>,
}

impl<T: Payload> InputBuffer<'_, T> {
    /// Recycle now. Equivalent to dropping the guard.
    pub fn recycle(self) {}
}

impl<T: Payload> Deref for InputBuffer<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Payload> DerefMut for InputBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Payload> Drop for InputBuffer<'_, T> {
    fn drop(&mut self) {
        let value = std::mem::take(&mut self.value);
        self.rx.release(value);
    }
}

/// An allocated buffer that is published only by [`OutputBuffer::send`].
/// Dropping it unsent returns the storage to the port.
pub struct OutputBuffer<'a, T: Payload> {
    value: T,
    port: &'a mut OutputPort<T>,
    sent: bool,
}

impl<T: Payload> OutputBuffer<'_, T> {
    pub fn send(mut self) -> PipelineResult<()> {
        let value = std::mem::take(&mut self.value);
        self.sent = true;
        self.port
            .tx
            .send(value)
            .map_err(|_| PipelineError::PeerClosed(self.port.name.clone()))
    }
}

impl<T: Payload> Deref for OutputBuffer<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Payload> DerefMut for OutputBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Payload> Drop for OutputBuffer<'_, T> {
    fn drop(&mut self) {
        if !self.sent {
            let value = std::mem::take(&mut self.value);
            self.port.tx.return_storage(value);
        }
    }
}

// ── Type-erased port sets ──

pub(crate) trait AnyInput: Send {
    fn name(&self) -> &str;
    fn payload(&self) -> &'static str;
    fn recycle(&mut self) -> PipelineResult<()>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Payload> AnyInput for InputPort<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn payload(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn recycle(&mut self) -> PipelineResult<()> {
        InputPort::recycle(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) trait AnyOutput: Send {
    fn name(&self) -> &str;
    fn payload(&self) -> &'static str;
    fn send(&mut self) -> PipelineResult<()>;
    /// Drop an unsent allocation back into storage. True if there was one.
    fn discard_pending(&mut self) -> bool;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Payload> AnyOutput for OutputPort<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn payload(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn send(&mut self) -> PipelineResult<()> {
        OutputPort::send(self)
    }

    fn discard_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(value) => {
                self.tx.return_storage(value);
                true
            }
            None => false,
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn downcast_input<'a, T: Payload>(
    port: &'a mut Box<dyn AnyInput>,
    name: &str,
) -> PipelineResult<&'a mut InputPort<T>> {
    let declared = port.payload();
    port.as_any_mut()
        .downcast_mut::<InputPort<T>>()
        .ok_or_else(|| PipelineError::PortTypeMismatch {
            name: name.to_string(),
            declared,
            requested: std::any::type_name::<T>(),
        })
}

/// A running kernel's input ports, addressed by name.
#[derive(Default)]
pub struct Inputs {
    ports: Vec<Box<dyn AnyInput>>,
}

impl Inputs {
    pub(crate) fn attach(&mut self, port: Box<dyn AnyInput>) {
        self.ports.push(port);
    }

    fn find(&mut self, name: &str) -> PipelineResult<&mut Box<dyn AnyInput>> {
        self.ports
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| PipelineError::UnknownPort {
                direction: "input",
                name: name.to_string(),
            })
    }

    fn position(&self, name: &str) -> PipelineResult<usize> {
        self.ports
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| PipelineError::UnknownPort {
                direction: "input",
                name: name.to_string(),
            })
    }

    /// The typed port called `name`.
    pub fn port<T: Payload>(&mut self, name: &str) -> PipelineResult<&mut InputPort<T>> {
        downcast_input(self.find(name)?, name)
    }

    /// Two distinct ports borrowed at once, so a kernel can hold a buffer
    /// from each while it combines them.
    pub fn pair<A: Payload, B: Payload>(
        &mut self,
        a: &str,
        b: &str,
    ) -> PipelineResult<(&mut InputPort<A>, &mut InputPort<B>)> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        if i == j {
            return Err(PipelineError::DuplicatePort(a.to_string()));
        }
        let (low, high) = self.ports.split_at_mut(i.max(j));
        let (first, second) = if i < j {
            (&mut low[i], &mut high[0])
        } else {
            (&mut high[0], &mut low[j])
        };
        Ok((downcast_input(first, a)?, downcast_input(second, b)?))
    }

    /// See [`InputPort::peek`].
    pub fn peek<T: Payload>(&mut self, name: &str) -> PipelineResult<Option<&mut T>> {
        Ok(self.port::<T>(name)?.peek())
    }

    /// See [`InputPort::recycle`].
    pub fn recycle(&mut self, name: &str) -> PipelineResult<()> {
        self.find(name)?.recycle()
    }

    /// See [`InputPort::peek_buffer`].
    pub fn peek_buffer<T: Payload>(
        &mut self,
        name: &str,
    ) -> PipelineResult<Option<InputBuffer<'_, T>>> {
        Ok(self.port::<T>(name)?.peek_buffer())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// A running kernel's output ports, addressed by name.
#[derive(Default)]
pub struct Outputs {
    ports: Vec<Box<dyn AnyOutput>>,
}

impl Outputs {
    pub(crate) fn attach(&mut self, port: Box<dyn AnyOutput>) {
        self.ports.push(port);
    }

    fn find(&mut self, name: &str) -> PipelineResult<&mut Box<dyn AnyOutput>> {
        self.ports
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| PipelineError::UnknownPort {
                direction: "output",
                name: name.to_string(),
            })
    }

    /// The typed port called `name`.
    pub fn port<T: Payload>(&mut self, name: &str) -> PipelineResult<&mut OutputPort<T>> {
        let port = self.find(name)?;
        let declared = port.payload();
        port.as_any_mut()
            .downcast_mut::<OutputPort<T>>()
            .ok_or_else(|| PipelineError::PortTypeMismatch {
                name: name.to_string(),
                declared,
                requested: std::any::type_name::<T>(),
            })
    }

    /// See [`OutputPort::allocate`].
    pub fn allocate<T: Payload>(&mut self, name: &str) -> PipelineResult<&mut T> {
        self.port::<T>(name)?.allocate()
    }

    /// See [`OutputPort::send`].
    pub fn send(&mut self, name: &str) -> PipelineResult<()> {
        self.find(name)?.send()
    }

    /// See [`OutputPort::allocate_buffer`].
    pub fn allocate_buffer<T: Payload>(&mut self, name: &str) -> PipelineResult<OutputBuffer<'_, T>> {
        self.port::<T>(name)?.allocate_buffer()
    }

    /// Discard every unsent allocation. Returns the names of the ports that
    /// had one.
    pub(crate) fn discard_pending(&mut self) -> Vec<String> {
        self.ports
            .iter_mut()
            .filter_map(|p| p.discard_pending().then(|| p.name().to_string()))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
