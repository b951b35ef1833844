//! Boxed representation of arguments and results
//!
//! Every argument that crosses from an override body into an invocation
//! chain travels as a `Value`. Value-typed data (`bool`, `i32`, `i64`, `f64`)
//! is stored inline, reference-typed data (strings, objects) is shared, and
//! by-reference parameters are carried as `Value::Ref` pointing at a
//! lock-protected `RefSlot`.
//!
//! ```text
//! caller            override body               chain
//!   x: i32  ──box──▶ Value::I32(x)  ───────────▶ args[0]
//!   ref y   ──box──▶ Value::Ref(RefSlot(y)) ────▶ args[1]   (write-back on return)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque shared handle to a heap object (proxy instances, user data)
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    /// Wrap a shared object
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        ObjectRef(object)
    }

    /// Try to view the object as a concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    /// Check whether the object is of type `T`
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().is::<T>()
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// A by-reference cell: the "box" a by-ref parameter or ref return travels in
#[derive(Clone, Default)]
pub struct RefSlot(Arc<Mutex<Value>>);

impl RefSlot {
    /// Create a slot holding `value`
    pub fn new(value: impl Into<Value>) -> Self {
        RefSlot(Arc::new(Mutex::new(value.into())))
    }

    /// Read the current content
    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    /// Overwrite the content
    pub fn set(&self, value: impl Into<Value>) {
        *self.0.lock() = value.into();
    }

    /// Overwrite the content and return the previous one
    pub fn replace(&self, value: impl Into<Value>) -> Value {
        std::mem::replace(&mut *self.0.lock(), value.into())
    }

    /// Apply `f` to the content under the slot's lock
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Slot identity (two refs aliasing the same storage)
    pub fn ptr_eq(&self, other: &RefSlot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_lock() {
            Some(inner) => write!(f, "RefSlot({:?})", *inner),
            None => write!(f, "RefSlot(<locked>)"),
        }
    }
}

/// Dynamically typed, boxed value
#[derive(Clone, Default)]
pub enum Value {
    /// Null reference; also the result of a member that returns no value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Shared heap object
    Object(ObjectRef),
    /// By-reference slot
    Ref(RefSlot),
}

impl Value {
    /// Box a shared object
    pub fn object<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Value::Object(ObjectRef::new(object))
    }

    /// Create a fresh by-ref slot holding `value`
    pub fn by_ref(value: impl Into<Value>) -> Self {
        Value::Ref(RefSlot::new(value))
    }

    /// Name of the runtime type, used in mismatch diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Ref(_) => "ref",
        }
    }

    /// Inline value types (everything a by-value copy fully describes)
    pub fn is_value_type(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::I32(_) | Value::I64(_) | Value::F64(_))
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the by-ref slot
    pub fn as_ref_slot(&self) -> Option<&RefSlot> {
        match self {
            Value::Ref(slot) => Some(slot),
            _ => None,
        }
    }

    /// Follow a `Ref` to its current content; other values are returned as-is
    pub fn deref_value(&self) -> Value {
        match self {
            Value::Ref(slot) => slot.get(),
            other => other.clone(),
        }
    }
}

/// Default value-equality: numbers and strings by value, objects and ref
/// slots by identity. NaN equals NaN.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::I32(i) => write!(f, "I32({})", i),
            Value::I64(i) => write!(f, "I64({})", i),
            Value::F64(x) => write!(f, "F64({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(o) => write!(f, "Object({:#x})", o.addr()),
            Value::Ref(slot) => write!(f, "{:?}", slot),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<RefSlot> for Value {
    fn from(slot: RefSlot) -> Self {
        Value::Ref(slot)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_primitives() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(42).as_i32(), Some(42));
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::from(1.5).is_value_type());
        assert!(!Value::from("hi").is_value_type());
    }

    #[test]
    fn test_equality_semantics() {
        assert_eq!(Value::from("a"), Value::from("a".to_string()));
        assert_ne!(Value::from(1), Value::from(1i64));

        let a = Arc::new(5u8);
        let first = Value::object(a.clone());
        let second = Value::object(a);
        let third = Value::object(Arc::new(5u8));
        assert_eq!(first, second);
        assert_ne!(first, third);

        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(f64::NAN), Value::F64(0.0));
    }

    #[test]
    fn test_ref_slot_aliasing() {
        let slot = RefSlot::new(0);
        let alias = Value::Ref(slot.clone());

        alias.as_ref_slot().unwrap().set(10);
        assert_eq!(slot.get(), Value::I32(10));
        assert_eq!(alias.deref_value(), Value::I32(10));

        let old = slot.replace(11);
        assert_eq!(old, Value::I32(10));
        slot.update(|v| *v = Value::I32(12));
        assert_eq!(slot.get(), Value::I32(12));
    }

    #[test]
    fn test_object_downcast() {
        let value = Value::object(Arc::new(String::from("payload")));
        let object = value.as_object().unwrap();
        assert!(object.is::<String>());
        assert_eq!(object.downcast::<String>().unwrap().as_str(), "payload");
        assert!(object.downcast::<u32>().is_none());
    }
}
