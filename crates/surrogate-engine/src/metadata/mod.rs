//! Prototype metadata schema
//!
//! The synthesizer never introspects Rust types. Prototypes describe their
//! overridable surface explicitly: types, members, modifiers, visibility and
//! the bodies that implement them.

pub mod member;
pub mod prototype;
pub mod types;

pub use member::{
    backing_field_name, default_value, AccessorKind, ConstructorBody, ConstructorDef, EventDef,
    HandlerBinding, IndexerDef, MethodBody, MethodDef, MethodSignature, ParamDef, PassingMode,
    PropertyDef, ReturnKind,
};
pub use prototype::{Prototype, PrototypeBuilder, PrototypeDef, PrototypeId, PrototypeKind};
pub use types::{GenericConstraint, GenericParam, Modifiers, TypeInfo, TypeKind, Visibility};
