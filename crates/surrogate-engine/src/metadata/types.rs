//! Type descriptions, visibility and member modifiers
//!
//! `TypeInfo` is the synthesizer's view of a parameter, return or generic
//! argument type. It is hashable so closed generic instantiations can be used
//! as cache keys.

use std::fmt;

use surrogate_sdk::Value;

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Built-in types (bool, i32, i64, f64, string, object)
    Primitive,
    /// Class types
    Class,
    /// Interface types
    Interface,
    /// An unresolved generic parameter (`T`)
    GenericParameter,
}

/// Type information for parameters, returns and generic arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// Type kind
    pub kind: TypeKind,
    /// Type name
    pub name: String,
    /// Type arguments (for closed generic classes / interfaces)
    pub type_arguments: Vec<TypeInfo>,
}

impl TypeInfo {
    /// Create a primitive type info
    pub fn primitive(name: &str) -> Self {
        Self {
            kind: TypeKind::Primitive,
            name: name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    /// Create a class type info
    pub fn class(name: &str) -> Self {
        Self {
            kind: TypeKind::Class,
            name: name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    /// Create an interface type info
    pub fn interface(name: &str) -> Self {
        Self {
            kind: TypeKind::Interface,
            name: name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    /// Reference to a generic parameter by name
    pub fn generic(name: &str) -> Self {
        Self {
            kind: TypeKind::GenericParameter,
            name: name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    /// `bool`
    pub fn bool() -> Self {
        Self::primitive("bool")
    }

    /// `i32`
    pub fn i32() -> Self {
        Self::primitive("i32")
    }

    /// `i64`
    pub fn i64() -> Self {
        Self::primitive("i64")
    }

    /// `f64`
    pub fn f64() -> Self {
        Self::primitive("f64")
    }

    /// `string`
    pub fn string() -> Self {
        Self::primitive("string")
    }

    /// `object` (accepts anything)
    pub fn object() -> Self {
        Self::primitive("object")
    }

    /// Attach type arguments
    pub fn with_arguments(mut self, arguments: Vec<TypeInfo>) -> Self {
        self.type_arguments = arguments;
        self
    }

    /// Inline value types; everything else is a reference type
    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::Primitive && matches!(self.name.as_str(), "bool" | "i32" | "i64" | "f64")
    }

    /// Whether the type still mentions a generic parameter
    pub fn is_open(&self) -> bool {
        self.kind == TypeKind::GenericParameter || self.type_arguments.iter().any(TypeInfo::is_open)
    }

    /// Replace generic parameters named in `params` by the matching `args`
    pub fn substitute(&self, params: &[GenericParam], args: &[TypeInfo]) -> TypeInfo {
        if self.kind == TypeKind::GenericParameter {
            if let Some(pos) = params.iter().position(|p| p.name == self.name) {
                if let Some(arg) = args.get(pos) {
                    return arg.clone();
                }
            }
            return self.clone();
        }
        if self.type_arguments.is_empty() {
            return self.clone();
        }
        TypeInfo {
            kind: self.kind,
            name: self.name.clone(),
            type_arguments: self
                .type_arguments
                .iter()
                .map(|t| t.substitute(params, args))
                .collect(),
        }
    }

    /// Whether a boxed value can be unboxed / cast to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self.kind {
            TypeKind::Primitive => match self.name.as_str() {
                "object" => true,
                "bool" => matches!(value, Value::Bool(_)),
                "i32" => matches!(value, Value::I32(_)),
                "i64" => matches!(value, Value::I64(_)),
                "f64" => matches!(value, Value::F64(_)),
                "string" => matches!(value, Value::Str(_) | Value::Null),
                _ => false,
            },
            TypeKind::Class | TypeKind::Interface => {
                matches!(value, Value::Object(_) | Value::Null)
            }
            TypeKind::GenericParameter => true,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_arguments.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.type_arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Accessibility of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to derived types
    Protected,
    /// Visible inside the defining module and to derived types
    ProtectedInternal,
    /// Visible inside the defining module only
    Internal,
    /// Visible to derived types inside the defining module only
    PrivateProtected,
    /// Visible inside the declaring type only
    Private,
}

impl Visibility {
    /// A type outside the defining module can name it
    pub fn is_externally_visible(self) -> bool {
        self == Visibility::Public
    }

    /// A derived type outside the defining module can reach it
    pub fn is_inheritable(self) -> bool {
        matches!(
            self,
            Visibility::Public | Visibility::Protected | Visibility::ProtectedInternal
        )
    }
}

/// Modifier flags for methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Static member
    pub is_static: bool,
    /// Virtual member (dispatch slot can be replaced)
    pub is_virtual: bool,
    /// Abstract member (no implementation)
    pub is_abstract: bool,
    /// Final member (sealed override)
    pub is_final: bool,
}

/// Constraint on a generic parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericConstraint {
    /// Argument must be a value type
    ValueType,
    /// Argument must be a reference type
    ReferenceType,
    /// Argument must have a parameterless constructor
    DefaultConstructor,
    /// Argument must be, derive from or implement the given type
    Implements(TypeInfo),
}

impl GenericConstraint {
    /// Check a closed argument against this constraint.
    ///
    /// Class hierarchies are not tracked by `TypeInfo`, so `Implements` is
    /// only decided for primitives; class and interface arguments pass.
    pub fn is_satisfied_by(&self, arg: &TypeInfo) -> bool {
        match self {
            GenericConstraint::ValueType => arg.is_value_type(),
            GenericConstraint::ReferenceType => !arg.is_value_type(),
            GenericConstraint::DefaultConstructor => {
                arg.is_value_type() || arg.kind == TypeKind::Class || arg.name == "object"
            }
            GenericConstraint::Implements(bound) => {
                arg == bound || bound.name == "object" || arg.kind != TypeKind::Primitive
            }
        }
    }
}

impl fmt::Display for GenericConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericConstraint::ValueType => write!(f, "struct"),
            GenericConstraint::ReferenceType => write!(f, "class"),
            GenericConstraint::DefaultConstructor => write!(f, "new()"),
            GenericConstraint::Implements(t) => write!(f, "{}", t),
        }
    }
}

/// A generic parameter of a method or prototype
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParam {
    /// Parameter name (e.g. "T")
    pub name: String,
    /// Constraints, in declaration order
    pub constraints: Vec<GenericConstraint>,
}

impl GenericParam {
    /// Unconstrained parameter
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint
    pub fn constrained(mut self, constraint: GenericConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// First constraint `arg` violates, if any
    pub fn violation(&self, arg: &TypeInfo) -> Option<&GenericConstraint> {
        self.constraints.iter().find(|c| !c.is_satisfied_by(arg))
    }
}
