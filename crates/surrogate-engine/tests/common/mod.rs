//! Shared prototypes and hooks for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use surrogate_engine::{
    ConstructorDef, FromValue, Hook, HookFactory, Invocation, MethodDef, Next, PropertyDef, Prototype,
    PrototypeBuilder, ProxyResult, TypeInfo, Value,
};

/// Records the name of every method it sees, then proceeds
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<String>>,
}

impl Hook for Recorder {
    fn intercept(&self, call: &mut Invocation<'_>, next: Next<'_>) -> ProxyResult<Value> {
        self.seen.lock().push(call.method().name.clone());
        next.proceed(call)
    }
}

/// A hook factory that hands out the same recorder to every type
pub fn recording(recorder: &Arc<Recorder>) -> HookFactory {
    let recorder = recorder.clone();
    HookFactory::fallible("Record", move || Ok(recorder.clone() as Arc<dyn Hook>))
}

/// Counts handler invocations
#[derive(Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// `Calculator` with a virtual `Add`, a non-virtual `Describe` and an
/// auto-implemented `Total` property
pub fn calculator() -> Prototype {
    calculator_builder().build()
}

/// `Calculator` before `build`, so tests can attach handlers and hooks
pub fn calculator_builder() -> PrototypeBuilder {
    Prototype::class("Calculator")
        .field("offset", 0)
        .constructor(ConstructorDef::new())
        .constructor(
            ConstructorDef::new()
                .param("offset", TypeInfo::i32())
                .body(|frame| {
                    let offset: i32 = frame.arg(0)?;
                    frame.field("offset")?.set(offset);
                    Ok(())
                }),
        )
        .method(
            MethodDef::new("Add")
                .param("a", TypeInfo::i32())
                .param("b", TypeInfo::i32())
                .returns(TypeInfo::i32())
                .virtual_()
                .body(|frame| {
                    let a: i32 = frame.arg(0)?;
                    let b: i32 = frame.arg(1)?;
                    let offset = i32::from_value(frame.field("offset")?.get())?;
                    Ok(Value::I32(a + b + offset))
                }),
        )
        .method(
            MethodDef::new("Describe")
                .returns(TypeInfo::string())
                .body(|_| Ok(Value::from("calculator"))),
        )
        .property(PropertyDef::auto("Total", TypeInfo::i32()))
}
