//! Explicit per-record mapping schema.
//!
//! A [`RecordSchema`] is declared once per record type through builders and
//! then shared by every reader/writer of that type. It carries:
//! - attributes with their declared types and field/accessor closures,
//! - resolved declarative configuration (header, default, format,
//!   validators, expressions, dropdown hints),
//! - creator candidates used to instantiate records while reading.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::spec::{AttributeDescriptor, MappingError, Result, TypeDecl};
use crate::value::{FromValue, IntoValue, Value};

/// Value extractor of one attribute.
pub type FnGetter<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;
/// Value assigner of one attribute.
pub type FnSetter<R> = Arc<dyn Fn(&mut R, Value) -> std::result::Result<(), String> + Send + Sync>;
/// Record constructor/factory body.
pub type FnCreate<R> = Arc<dyn Fn(CreatorArgs) -> std::result::Result<R, String> + Send + Sync>;

fn derive_getter<R, T, G>(get: G) -> FnGetter<R>
where
    T: IntoValue,
    G: Fn(&R) -> T + Send + Sync + 'static,
{
    Arc::new(move |record: &R| get(record).into_value())
}

fn derive_setter<R, T, S>(set: S) -> FnSetter<R>
where
    T: FromValue,
    S: Fn(&mut R, T) + Send + Sync + 'static,
{
    Arc::new(move |record: &mut R, value: Value| {
        let typed = T::from_value(value)?;
        set(record, typed);
        Ok(())
    })
}

////////////////////////////////////////////////////////////////////////////////
// #region Validators

/// Check applied to a cell's raw text before decoding.
pub trait CellValidator: Send + Sync {
    /// Return an error message when `raw` is not acceptable.
    fn validate(&self, raw: &str) -> std::result::Result<(), String>;
}

impl<F> CellValidator for F
where
    F: Fn(&str) -> std::result::Result<(), String> + Send + Sync,
{
    fn validate(&self, raw: &str) -> std::result::Result<(), String> {
        self(raw)
    }
}

/// Rejects text not fully matching a regular expression.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    regex: Regex,
}

impl RegexValidator {
    /// Compile `pattern`; the whole cell text must match it.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            MappingError::configuration(format!("Invalid validator pattern {pattern:?}: {err}"))
        })?;
        Ok(Self { regex })
    }
}

impl CellValidator for RegexValidator {
    fn validate(&self, raw: &str) -> std::result::Result<(), String> {
        if self.regex.is_match(raw) {
            Ok(())
        } else {
            Err(format!("does not match {}", self.regex.as_str()))
        }
    }
}

/// Rejects text whose character count is outside `[n_min, n_max]`.
#[derive(Debug, Clone)]
pub struct LengthValidator {
    n_min: usize,
    n_max: Option<usize>,
}

impl LengthValidator {
    /// Length bounds, inclusive.
    pub fn new(n_min: usize, n_max: Option<usize>) -> Self {
        Self { n_min, n_max }
    }
}

impl CellValidator for LengthValidator {
    fn validate(&self, raw: &str) -> std::result::Result<(), String> {
        let n_len = raw.chars().count();
        if n_len < self.n_min {
            return Err(format!("length {n_len} is below minimum {}", self.n_min));
        }
        if let Some(n_max) = self.n_max
            && n_len > n_max
        {
            return Err(format!("length {n_len} exceeds maximum {n_max}"));
        }
        Ok(())
    }
}

/// Rejects text not equal to one of the allowed literals.
#[derive(Debug, Clone)]
pub struct OneOfValidator {
    set_allowed: BTreeSet<String>,
}

impl OneOfValidator {
    /// Allowed literals.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set_allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl CellValidator for OneOfValidator {
    fn validate(&self, raw: &str) -> std::result::Result<(), String> {
        if self.set_allowed.contains(raw) {
            Ok(())
        } else {
            Err(format!("expected one of {:?}", self.set_allowed))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Attributes

/// Already-resolved declarative configuration of one attribute.
#[derive(Clone, Default)]
pub struct SpecAttributeConfig {
    /// Column header; defaults to the attribute name.
    pub header: Option<String>,
    /// Attribute-level default raw text.
    pub default_value: Option<String>,
    /// Format pattern passed to handlers.
    pub format: Option<String>,
    /// Validators applied in order on read.
    pub validators: Vec<Arc<dyn CellValidator>>,
    /// Expression used instead of the handler when reading.
    pub expression_read: Option<String>,
    /// Expression used instead of the handler when writing.
    pub expression_write: Option<String>,
    /// Dropdown choices for sheet front-ends; not used by conversion.
    pub dropdown: Option<Vec<String>>,
}

impl fmt::Debug for SpecAttributeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecAttributeConfig")
            .field("header", &self.header)
            .field("default_value", &self.default_value)
            .field("format", &self.format)
            .field("validators", &self.validators.len())
            .field("expression_read", &self.expression_read)
            .field("expression_write", &self.expression_write)
            .field("dropdown", &self.dropdown)
            .finish()
    }
}

/// Accessor closure with its declared type and visibility.
pub struct SpecAccessor<F> {
    /// Return type (getter) or parameter type (setter).
    pub type_decl: TypeDecl,
    /// Whether the accessor may be called by the mapper.
    pub if_visible: bool,
    /// Accessor body.
    pub func: F,
}

/// One mapped attribute of record type `R`.
pub struct SpecAttribute<R> {
    name: String,
    type_decl: TypeDecl,
    field_get: Option<FnGetter<R>>,
    field_set: Option<FnSetter<R>>,
    accessor_get: Option<SpecAccessor<FnGetter<R>>>,
    accessor_set: Option<SpecAccessor<FnSetter<R>>>,
    config: SpecAttributeConfig,
}

impl<R: 'static> SpecAttribute<R> {
    /// Attribute named `name` of declared type `type_decl`.
    pub fn new(name: impl Into<String>, type_decl: impl Into<TypeDecl>) -> Self {
        Self {
            name: name.into(),
            type_decl: type_decl.into(),
            field_get: None,
            field_set: None,
            accessor_get: None,
            accessor_set: None,
            config: SpecAttributeConfig::default(),
        }
    }

    /// Direct field read and assignment.
    pub fn field<T, G, S>(mut self, get: G, set: S) -> Self
    where
        T: IntoValue + FromValue + 'static,
        G: Fn(&R) -> T + Send + Sync + 'static,
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        self.field_get = Some(derive_getter(get));
        self.field_set = Some(derive_setter(set));
        self
    }

    /// Direct field read only; the value is assigned through a creator.
    pub fn field_get<T, G>(mut self, get: G) -> Self
    where
        T: IntoValue + 'static,
        G: Fn(&R) -> T + Send + Sync + 'static,
    {
        self.field_get = Some(derive_getter(get));
        self
    }

    /// Getter accessor returning `type_decl`.
    pub fn accessor_get<T, G>(
        mut self,
        type_decl: impl Into<TypeDecl>,
        if_visible: bool,
        get: G,
    ) -> Self
    where
        T: IntoValue + 'static,
        G: Fn(&R) -> T + Send + Sync + 'static,
    {
        self.accessor_get = Some(SpecAccessor {
            type_decl: type_decl.into(),
            if_visible,
            func: derive_getter(get),
        });
        self
    }

    /// Setter accessor taking `type_decl`.
    pub fn accessor_set<T, S>(
        mut self,
        type_decl: impl Into<TypeDecl>,
        if_visible: bool,
        set: S,
    ) -> Self
    where
        T: FromValue + 'static,
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        self.accessor_set = Some(SpecAccessor {
            type_decl: type_decl.into(),
            if_visible,
            func: derive_setter(set),
        });
        self
    }

    /// Header override.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.config.header = Some(header.into());
        self
    }

    /// Attribute-level default raw text.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.config.default_value = Some(value.into());
        self
    }

    /// Format pattern for context-sensitive handlers.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.config.format = Some(format.into());
        self
    }

    /// Append a validator.
    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: CellValidator + 'static,
    {
        self.config.validators.push(Arc::new(validator));
        self
    }

    /// Read-direction expression.
    pub fn expression_read(mut self, expression: impl Into<String>) -> Self {
        self.config.expression_read = Some(expression.into());
        self
    }

    /// Write-direction expression.
    pub fn expression_write(mut self, expression: impl Into<String>) -> Self {
        self.config.expression_write = Some(expression.into());
        self
    }

    /// Dropdown choices.
    pub fn dropdown<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.dropdown = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SpecAttributeConfig) -> Self {
        self.config = config;
        self
    }
}

impl<R> SpecAttribute<R> {
    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn type_decl(&self) -> &TypeDecl {
        &self.type_decl
    }

    /// Resolved configuration.
    pub fn attribute_config(&self) -> &SpecAttributeConfig {
        &self.config
    }

    /// Header text used for this attribute's column.
    pub fn header_text(&self) -> &str {
        self.config.header.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn field_getter(&self) -> Option<&FnGetter<R>> {
        self.field_get.as_ref()
    }

    pub(crate) fn field_setter(&self) -> Option<&FnSetter<R>> {
        self.field_set.as_ref()
    }

    pub(crate) fn accessor_getter(&self) -> Option<&SpecAccessor<FnGetter<R>>> {
        self.accessor_get.as_ref()
    }

    pub(crate) fn accessor_setter(&self) -> Option<&SpecAccessor<FnSetter<R>>> {
        self.accessor_set.as_ref()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Creators

/// Creator flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCreatorKind {
    /// Constructor of the record type.
    Constructor,
    /// Static factory method returning the record type.
    Factory,
}

/// Declared creator parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCreatorParam {
    /// Parameter name, if known.
    pub name: Option<String>,
    /// Declared parameter type.
    pub type_decl: TypeDecl,
    /// Whether the name was given explicitly.
    pub if_explicit_name: bool,
}

impl SpecCreatorParam {
    /// Explicitly named parameter.
    pub fn named(name: impl Into<String>, type_decl: impl Into<TypeDecl>) -> Self {
        Self {
            name: Some(name.into()),
            type_decl: type_decl.into(),
            if_explicit_name: true,
        }
    }

    /// Parameter whose name was inferred rather than declared.
    pub fn inferred(name: impl Into<String>, type_decl: impl Into<TypeDecl>) -> Self {
        Self {
            name: Some(name.into()),
            type_decl: type_decl.into(),
            if_explicit_name: false,
        }
    }

    /// Parameter without a resolvable name.
    pub fn unnamed(type_decl: impl Into<TypeDecl>) -> Self {
        Self {
            name: None,
            type_decl: type_decl.into(),
            if_explicit_name: false,
        }
    }
}

/// Arguments handed to a creator body, in parameter order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreatorArgs {
    l_values: Vec<Option<Value>>,
}

impl CreatorArgs {
    /// Wrap decoded argument values.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            l_values: values.into_iter().map(Some).collect(),
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.l_values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.l_values.is_empty()
    }

    /// Move argument `idx` out, converted to `T`.
    pub fn take<T: FromValue>(&mut self, idx: usize) -> std::result::Result<T, String> {
        let value = self
            .l_values
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or_else(|| format!("creator argument {idx} is missing or already taken"))?;
        T::from_value(value).map_err(|err| format!("creator argument {idx}: {err}"))
    }
}

/// Candidate constructor or factory of record type `R`.
pub struct SpecCreator<R> {
    kind: EnumCreatorKind,
    name: String,
    if_marked: bool,
    params: Vec<SpecCreatorParam>,
    func: FnCreate<R>,
}

impl<R: 'static> SpecCreator<R> {
    fn new<F>(kind: EnumCreatorKind, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(CreatorArgs) -> std::result::Result<R, String> + Send + Sync + 'static,
    {
        Self {
            kind,
            name: name.into(),
            if_marked: false,
            params: vec![],
            func: Arc::new(func),
        }
    }

    /// Constructor candidate.
    pub fn constructor<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(CreatorArgs) -> std::result::Result<R, String> + Send + Sync + 'static,
    {
        Self::new(EnumCreatorKind::Constructor, name, func)
    }

    /// Static factory candidate.
    pub fn factory<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(CreatorArgs) -> std::result::Result<R, String> + Send + Sync + 'static,
    {
        Self::new(EnumCreatorKind::Factory, name, func)
    }

    /// Append a parameter.
    pub fn param(mut self, param: SpecCreatorParam) -> Self {
        self.params.push(param);
        self
    }

    /// Explicitly mark this candidate as the record's creator.
    pub fn marked(mut self) -> Self {
        self.if_marked = true;
        self
    }
}

impl<R> SpecCreator<R> {
    /// Creator flavour.
    pub fn kind(&self) -> EnumCreatorKind {
        self.kind
    }

    /// Creator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether explicitly marked.
    pub fn is_marked(&self) -> bool {
        self.if_marked
    }

    /// Declared parameters.
    pub fn params(&self) -> &[SpecCreatorParam] {
        &self.params
    }

    pub(crate) fn func(&self) -> &FnCreate<R> {
        &self.func
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Schema

/// Complete mapping declaration of record type `R`.
pub struct RecordSchema<R> {
    type_name: String,
    default_value: Option<String>,
    attributes: Vec<SpecAttribute<R>>,
    creators: Vec<SpecCreator<R>>,
}

impl<R> RecordSchema<R> {
    /// Start declaring a schema for the record type named `type_name`.
    pub fn builder(type_name: impl Into<String>) -> RecordSchemaBuilder<R> {
        RecordSchemaBuilder {
            type_name: type_name.into(),
            default_value: None,
            attributes: vec![],
            creators: vec![],
        }
    }

    /// Record type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type-level default raw text.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[SpecAttribute<R>] {
        &self.attributes
    }

    /// Attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&SpecAttribute<R>> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Creator candidates in declaration order.
    pub fn creators(&self) -> &[SpecCreator<R>] {
        &self.creators
    }

    /// Immutable descriptors of all attributes.
    pub fn descriptors(&self) -> Vec<AttributeDescriptor> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(n_idx, attr)| AttributeDescriptor {
                name: attr.name.clone(),
                declaring_type: self.type_name.clone(),
                type_decl: attr.type_decl.clone(),
                index: n_idx,
            })
            .collect()
    }
}

impl<R> fmt::Debug for RecordSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("type_name", &self.type_name)
            .field(
                "attributes",
                &self.attributes.iter().map(SpecAttribute::name).collect::<Vec<_>>(),
            )
            .field(
                "creators",
                &self.creators.iter().map(SpecCreator::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder of [`RecordSchema`].
pub struct RecordSchemaBuilder<R> {
    type_name: String,
    default_value: Option<String>,
    attributes: Vec<SpecAttribute<R>>,
    creators: Vec<SpecCreator<R>>,
}

impl<R: 'static> RecordSchemaBuilder<R> {
    /// Type-level default raw text, used by attributes without their own.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Append an attribute.
    pub fn attribute(mut self, attribute: SpecAttribute<R>) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append a creator candidate.
    pub fn creator(mut self, creator: SpecCreator<R>) -> Self {
        self.creators.push(creator);
        self
    }

    /// Append an unmarked no-argument constructor built from `R::default()`.
    pub fn default_constructor(self) -> Self
    where
        R: Default,
    {
        self.creator(SpecCreator::constructor("default", |_| Ok(R::default())))
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<RecordSchema<R>> {
        if self.type_name.trim().is_empty() {
            return Err(MappingError::configuration("Record type name must not be empty."));
        }

        let mut set_names = BTreeSet::new();
        let mut dict_headers: BTreeMap<&str, &str> = BTreeMap::new();
        for attr in &self.attributes {
            if attr.name.trim().is_empty() {
                return Err(MappingError::configuration(format!(
                    "Record type `{}` declares an attribute without a name.",
                    self.type_name
                )));
            }
            if !set_names.insert(attr.name.as_str()) {
                return Err(MappingError::configuration(format!(
                    "Record type `{}` declares attribute `{}` more than once.",
                    self.type_name, attr.name
                )));
            }
            if let Some(c_other) = dict_headers.insert(attr.header_text(), attr.name.as_str()) {
                return Err(MappingError::configuration(format!(
                    "Record type `{}` maps attributes `{c_other}` and `{}` to the same header {:?}.",
                    self.type_name,
                    attr.name,
                    attr.header_text()
                )));
            }
        }

        Ok(RecordSchema {
            type_name: self.type_name,
            default_value: self.default_value,
            attributes: self.attributes,
            creators: self.creators,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TypeKey;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        label: String,
    }

    #[test]
    fn field_closures_bridge_typed_fields_and_values() {
        let attr =
            SpecAttribute::<Point>::new("x", TypeKey::I32).field(|p: &Point| p.x, |p, v| p.x = v);
        let mut point = Point::default();

        let setter = attr.field_setter().unwrap();
        setter(&mut point, Value::Int(7)).unwrap();
        assert_eq!(point.x, 7);
        assert!(setter(&mut point, Value::Str("7".to_string())).is_err());

        let getter = attr.field_getter().unwrap();
        assert_eq!(getter(&point), Value::Int(7));
    }

    #[test]
    fn duplicate_attribute_names_are_rejected() {
        let result = RecordSchema::<Point>::builder("Point")
            .attribute(SpecAttribute::new("x", TypeKey::I32))
            .attribute(SpecAttribute::new("x", TypeKey::I64))
            .build();
        assert!(matches!(result, Err(MappingError::Configuration(_))));
    }

    #[test]
    fn colliding_header_texts_are_rejected() {
        let result = RecordSchema::<Point>::builder("Point")
            .attribute(SpecAttribute::new("x", TypeKey::I32).header("Label"))
            .attribute(SpecAttribute::new("label", TypeKey::String).header("Label"))
            .build();
        assert!(matches!(result, Err(MappingError::Configuration(_))));

        let result = RecordSchema::<Point>::builder("Point")
            .attribute(SpecAttribute::new("x", TypeKey::I32).header("label"))
            .attribute(SpecAttribute::new("label", TypeKey::String))
            .build();
        assert!(matches!(result, Err(MappingError::Configuration(_))));
    }

    #[test]
    fn creator_args_convert_and_move_out_once() {
        let mut args = CreatorArgs::new(vec![Value::Int(3), Value::Str("p".to_string())]);
        assert_eq!(args.take::<i32>(0), Ok(3));
        assert!(args.take::<i32>(0).is_err());
        assert_eq!(args.take::<String>(1), Ok("p".to_string()));
        assert!(args.take::<String>(2).is_err());
    }

    #[test]
    fn header_text_defaults_to_attribute_name() {
        let attr = SpecAttribute::<Point>::new("label", TypeKey::String);
        assert_eq!(attr.header_text(), "label");
        let attr = attr.header("Label");
        assert_eq!(attr.header_text(), "Label");
    }

    #[test]
    fn builtin_validators_report_rejections() {
        let validator = RegexValidator::new("[A-Z]{2}[0-9]+").unwrap();
        assert!(validator.validate("AB12").is_ok());
        assert!(validator.validate("xAB12").is_err());
        assert!(RegexValidator::new("(").is_err());

        let validator = LengthValidator::new(2, Some(3));
        assert!(validator.validate("a").is_err());
        assert!(validator.validate("abc").is_ok());
        assert!(validator.validate("abcd").is_err());

        let validator = OneOfValidator::new(["RED", "GREEN"]);
        assert!(validator.validate("RED").is_ok());
        assert!(validator.validate("BLUE").is_err());
    }
}
