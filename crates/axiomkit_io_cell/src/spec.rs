//! Shared type models, options and error types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::SpecSequenceCodec;
use crate::conf::C_TYPE_NAME_TOP;
use crate::converter::ExpressionEvaluator;

////////////////////////////////////////////////////////////////////////////////
// #region TypeModel

/// Declared enum type with its ordered constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecEnumType {
    /// Enum type name.
    pub name: String,
    /// Declared constants in declaration order.
    pub constants: Vec<String>,
}

impl SpecEnumType {
    /// Create enum type from name and constants.
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    /// Return the declared constant equal to `literal`, if any.
    pub fn find_constant(&self, literal: &str) -> Option<&str> {
        self.constants
            .iter()
            .find(|c_constant| c_constant.as_str() == literal)
            .map(String::as_str)
    }
}

/// Reified scalar type used as the registry lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKey {
    /// `bool`.
    Bool,
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `char`.
    Char,
    /// `String`.
    String,
    /// Calendar date without zone.
    Date,
    /// Wall-clock time without zone.
    Time,
    /// Date and time without zone.
    DateTime,
    /// `uuid::Uuid`.
    Uuid,
    /// A declared enum type.
    Enum(SpecEnumType),
    /// Any other reified class, identified by name.
    Named(String),
}

impl TypeKey {
    /// Human-readable type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::String => "String",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::DateTime => "DateTime",
            Self::Uuid => "Uuid",
            Self::Enum(spec_enum) => &spec_enum.name,
            Self::Named(name) => name,
        }
    }

    /// Whether the key names no type at all (empty enum/class name).
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Enum(spec_enum) => spec_enum.name.trim().is_empty(),
            Self::Named(name) => name.trim().is_empty(),
            _ => false,
        }
    }

    /// Whether the type is a fixed-width number, `bool` or `char`.
    ///
    /// These decode blank input to a zero value instead of an absent one.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::F32
                | Self::F64
                | Self::Char
        )
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Raw (unparameterized) type of a parameterized declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawType {
    /// Sequence-like collection (`List`, `Set`, `Vec`, ...).
    Sequence(String),
    /// Any other class; parameters are erased during classification.
    Class(TypeKey),
}

impl RawType {
    /// Raw type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Sequence(name) => name,
            Self::Class(key) => key.type_name(),
        }
    }
}

/// Declared attribute type, possibly generic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDecl {
    /// Reified non-array class.
    Class(TypeKey),
    /// Reified array with its component type.
    Array(Box<TypeDecl>),
    /// Generic array (`T[]`, `List<X>[]`).
    GenericArray(Box<TypeDecl>),
    /// Parameterized type such as `List<UUID>`.
    Parameterized {
        /// Raw type.
        raw: RawType,
        /// Type arguments in declaration order.
        args: Vec<TypeDecl>,
    },
    /// Bound type variable; the first bound is authoritative.
    Variable {
        /// Variable name.
        name: String,
        /// Declared bounds.
        bounds: Vec<TypeDecl>,
    },
    /// Wildcard type argument.
    Wildcard {
        /// `? super X` bound.
        lower: Option<Box<TypeDecl>>,
        /// `? extends X` bounds.
        upper: Vec<TypeDecl>,
    },
}

impl TypeDecl {
    /// Reified class declaration.
    pub fn class(key: TypeKey) -> Self {
        Self::Class(key)
    }

    /// Reified array of `component`.
    pub fn array(component: TypeDecl) -> Self {
        Self::Array(Box::new(component))
    }

    /// Generic array of `component`.
    pub fn generic_array(component: TypeDecl) -> Self {
        Self::GenericArray(Box::new(component))
    }

    /// Parameterized sequence type, e.g. `list("List", uuid)`.
    pub fn sequence(raw_name: impl Into<String>, element: TypeDecl) -> Self {
        Self::Parameterized {
            raw: RawType::Sequence(raw_name.into()),
            args: vec![element],
        }
    }

    /// `List<element>`.
    pub fn list(element: TypeDecl) -> Self {
        Self::sequence("List", element)
    }

    /// `Set<element>`.
    pub fn set(element: TypeDecl) -> Self {
        Self::sequence("Set", element)
    }

    /// Parameterized non-sequence type.
    pub fn parameterized(raw: TypeKey, args: Vec<TypeDecl>) -> Self {
        Self::Parameterized {
            raw: RawType::Class(raw),
            args,
        }
    }

    /// Bound type variable.
    pub fn variable(name: impl Into<String>, bounds: Vec<TypeDecl>) -> Self {
        Self::Variable {
            name: name.into(),
            bounds,
        }
    }

    /// `? extends upper`.
    pub fn wildcard_extends(upper: TypeDecl) -> Self {
        Self::Wildcard {
            lower: None,
            upper: vec![upper],
        }
    }

    /// `? super lower`.
    pub fn wildcard_super(lower: TypeDecl) -> Self {
        Self::Wildcard {
            lower: Some(Box::new(lower)),
            upper: vec![],
        }
    }

    /// Reified key when the declaration is a plain class.
    pub fn as_class(&self) -> Option<&TypeKey> {
        match self {
            Self::Class(key) => Some(key),
            _ => None,
        }
    }
}

impl From<TypeKey> for TypeDecl {
    fn from(key: TypeKey) -> Self {
        Self::Class(key)
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(key) => write!(f, "{key}"),
            Self::Array(component) | Self::GenericArray(component) => write!(f, "{component}[]"),
            Self::Parameterized { raw, args } => {
                let c_args = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}<{c_args}>", raw.type_name())
            }
            Self::Variable { name, .. } => f.write_str(name),
            Self::Wildcard { lower, upper } => {
                if let Some(lower) = lower {
                    write!(f, "? super {lower}")
                } else if let Some(upper) = upper.first() {
                    if upper.as_class().map(TypeKey::type_name) == Some(C_TYPE_NAME_TOP) {
                        f.write_str("?")
                    } else {
                        write!(f, "? extends {upper}")
                    }
                } else {
                    f.write_str("?")
                }
            }
        }
    }
}

/// Container kind of a declared attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumContainerKind {
    /// Scalar value handled by one type handler.
    Concrete,
    /// Array of elements.
    Array,
    /// Sequence-like collection of elements.
    Iterable,
}

/// One classification step: shape plus the type one level down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecContainerClassification {
    /// Container kind.
    pub kind: EnumContainerKind,
    /// Element type; the class itself for [`EnumContainerKind::Concrete`].
    pub element_type: TypeDecl,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AttributeModel

/// Immutable identity of one mapped record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor {
    /// Attribute name.
    pub name: String,
    /// Declaring record type name.
    pub declaring_type: String,
    /// Declared attribute type.
    pub type_decl: TypeDecl,
    /// Position within the record schema.
    pub index: usize,
}

/// Origin of an attribute's resolved default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumDefaultValueSource {
    /// No default applies.
    #[default]
    None,
    /// Declared on the record type.
    Type,
    /// Declared on the attribute.
    Attribute,
    /// Supplied by the run's [`RuntimeDefaultStrategy`].
    RuntimeStrategy,
}

/// Resolved default value of one attribute for one mapping run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecDefaultValueMeta {
    /// Default raw text, if any.
    pub value: Option<String>,
    /// Where the value came from.
    pub source: EnumDefaultValueSource,
}

impl SpecDefaultValueMeta {
    /// Meta without any default.
    pub fn none() -> Self {
        Self::default()
    }

    /// Meta with a value from `source`.
    pub fn of(value: impl Into<String>, source: EnumDefaultValueSource) -> Self {
        Self {
            value: Some(value.into()),
            source,
        }
    }
}

/// Runtime default-value override consulted after attribute and type defaults.
pub trait RuntimeDefaultStrategy: Send + Sync {
    /// Default raw text for `attribute`, or `None` to decline.
    fn default_for(&self, attribute: &AttributeDescriptor) -> Option<String>;
}

impl<F> RuntimeDefaultStrategy for F
where
    F: Fn(&AttributeDescriptor) -> Option<String> + Send + Sync,
{
    fn default_for(&self, attribute: &AttributeDescriptor) -> Option<String> {
        self(attribute)
    }
}

/// Candidate creator parameter after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecResolvedParameter {
    /// Parameter name, when known.
    pub name: Option<String>,
    /// Declared parameter type.
    pub type_decl: TypeDecl,
    /// Zero-based parameter position.
    pub index: usize,
    /// Whether the name was given explicitly rather than inferred.
    pub if_explicitly_named: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumDirection {
    /// Cell text into record values.
    Read,
    /// Record values into cell text.
    Write,
}

/// Preferred way of reaching attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAccessMode {
    /// Read/assign the field directly (default).
    #[default]
    Field,
    /// Use a conforming accessor when one exists, else fall back to field.
    Accessor,
}

/// Per-run mapping options.
#[derive(Clone, Default)]
pub struct SpecMappingOptions {
    /// Accessor preference.
    pub rule_access: EnumAccessMode,
    /// Runtime default override (lowest-precedence explicit default).
    pub default_strategy: Option<Arc<dyn RuntimeDefaultStrategy>>,
    /// Bracketed sequence settings for array/iterable attributes.
    pub sequence_codec: SpecSequenceCodec,
    /// Evaluator for attributes declaring expression-based conversion.
    pub expression_evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl fmt::Debug for SpecMappingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecMappingOptions")
            .field("rule_access", &self.rule_access)
            .field("default_strategy", &self.default_strategy.is_some())
            .field("sequence_codec", &self.sequence_codec)
            .field("expression_evaluator", &self.expression_evaluator.is_some())
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure raised by the mapping engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    /// Malformed mapping declaration, raised before any row is processed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Handler or expression failed for one value.
    #[error("Cannot convert attribute `{attribute}` of type `{type_name}` from {raw:?}: {message}")]
    Conversion {
        /// Attribute name.
        attribute: String,
        /// Declared type name.
        type_name: String,
        /// Offending raw value.
        raw: String,
        /// Underlying failure text.
        message: String,
    },
    /// A validator rejected a cell's raw text.
    #[error("Validation failed for attribute `{attribute}` with value {raw:?}: {message}")]
    Validation {
        /// Attribute name.
        attribute: String,
        /// Rejected raw text.
        raw: String,
        /// Validator message.
        message: String,
    },
    /// Unbalanced bracketed sequence.
    #[error("Parse error in {input:?}: {message}")]
    Parse {
        /// Offending input.
        input: String,
        /// What went wrong.
        message: String,
    },
    /// Row sink or source failure reported by the tabular engine.
    #[error("Tabular I/O error: {0}")]
    Tabular(String),
    /// Internal invariant violated.
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl MappingError {
    /// Build a [`MappingError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`MappingError::Conversion`] for `descriptor`.
    pub fn conversion(
        descriptor: &AttributeDescriptor,
        raw: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            attribute: descriptor.name.clone(),
            type_name: descriptor.type_decl.to_string(),
            raw: raw.into(),
            message: message.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MappingError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_decl_display_matches_declaration_syntax() {
        let decl = TypeDecl::list(TypeDecl::set(TypeDecl::class(TypeKey::Uuid)));
        assert_eq!(decl.to_string(), "List<Set<Uuid>>");

        let decl = TypeDecl::array(TypeDecl::array(TypeDecl::class(TypeKey::I32)));
        assert_eq!(decl.to_string(), "i32[][]");

        let decl = TypeDecl::list(TypeDecl::wildcard_super(TypeDecl::class(TypeKey::I64)));
        assert_eq!(decl.to_string(), "List<? super i64>");
    }

    #[test]
    fn absent_type_keys_are_detected() {
        assert!(TypeKey::Named(" ".to_string()).is_absent());
        assert!(TypeKey::Enum(SpecEnumType::new("", ["A"])).is_absent());
        assert!(!TypeKey::Named("Money".to_string()).is_absent());
        assert!(!TypeKey::I32.is_absent());
    }

    #[test]
    fn conversion_error_names_attribute_type_and_raw_value() {
        let descriptor = AttributeDescriptor {
            name: "age".to_string(),
            declaring_type: "Person".to_string(),
            type_decl: TypeDecl::class(TypeKey::I32),
            index: 0,
        };
        let err = MappingError::conversion(&descriptor, "abc", "invalid digit");
        let txt = err.to_string();
        assert!(txt.contains("`age`"));
        assert!(txt.contains("`i32`"));
        assert!(txt.contains("\"abc\""));
    }
}
