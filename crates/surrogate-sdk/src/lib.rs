//! Surrogate SDK - value model shared by synthesized proxies and their handlers
//!
//! This crate holds the pieces an invocation handler or hook needs without
//! depending on the synthesizer itself:
//!
//! - [`Value`]: boxed argument / result representation
//! - [`RefSlot`]: by-reference cell ("boxed box")
//! - [`ArgumentEnvelope`]: ordered arguments of one intercepted call
//! - [`FromValue`] / [`IntoValue`]: unboxing and boxing
//! - [`ProxyError`]: the error taxonomy

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod convert;
pub mod envelope;
pub mod error;
pub mod value;

pub use convert::{FromValue, IntoValue};
pub use envelope::ArgumentEnvelope;
pub use error::{ProxyError, ProxyResult};
pub use value::{ObjectRef, RefSlot, Value};
