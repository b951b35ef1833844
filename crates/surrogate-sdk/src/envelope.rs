//! Ordered, boxed arguments of one call
//!
//! By-reference positions hold a `Value::Ref` box. Reads through `get` see the
//! box's current content and writes through `set` land in the box, so an
//! interceptor can rewrite an `out`/`ref` argument and the override body
//! copies the result back to the caller after the chain returns.

use crate::convert::FromValue;
use crate::error::{ProxyError, ProxyResult};
use crate::value::{RefSlot, Value};

/// Ordered, boxed call arguments
#[derive(Debug, Clone, Default)]
pub struct ArgumentEnvelope {
    args: Vec<Value>,
}

impl ArgumentEnvelope {
    /// Create an envelope from already-boxed arguments
    pub fn new(args: Vec<Value>) -> Self {
        Self { args }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check if the call has no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Read an argument; by-ref positions yield the box's current content
    pub fn get(&self, index: usize) -> ProxyResult<Value> {
        self.args
            .get(index)
            .map(Value::deref_value)
            .ok_or_else(|| out_of_range(index, self.args.len()))
    }

    /// Read and unbox an argument
    pub fn arg<T: FromValue>(&self, index: usize) -> ProxyResult<T> {
        T::from_value(self.get(index)?)
    }

    /// Replace an argument; by-ref positions are written through
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> ProxyResult<()> {
        let len = self.args.len();
        match self.args.get_mut(index) {
            Some(Value::Ref(slot)) => {
                slot.set(value);
                Ok(())
            }
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(out_of_range(index, len)),
        }
    }

    /// The box behind a by-ref position
    pub fn ref_slot(&self, index: usize) -> Option<&RefSlot> {
        self.args.get(index).and_then(Value::as_ref_slot)
    }

    /// Whether `index` is a by-ref position
    pub fn is_by_ref(&self, index: usize) -> bool {
        self.ref_slot(index).is_some()
    }

    /// Raw boxed arguments (by-ref positions still as `Value::Ref`)
    pub fn raw(&self) -> &[Value] {
        &self.args
    }

    /// Arguments with by-ref positions dereferenced
    pub fn values(&self) -> Vec<Value> {
        self.args.iter().map(Value::deref_value).collect()
    }

    /// Take the boxed arguments back
    pub fn into_inner(self) -> Vec<Value> {
        self.args
    }
}

fn out_of_range(index: usize, len: usize) -> ProxyError {
    ProxyError::ArgumentError(format!(
        "argument index {} out of range for {} argument(s)",
        index, len
    ))
}

impl From<Vec<Value>> for ArgumentEnvelope {
    fn from(args: Vec<Value>) -> Self {
        Self::new(args)
    }
}
