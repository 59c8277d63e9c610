//! Attribute analyzer.
//!
//! Produces one immutable [`Analysis`] per attribute and direction. Analyses
//! are built once per mapping session and shared read-only by every row.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::container::{ShapeNode, build_shape};
use crate::handler::{SpecAttributeContext, TypeHandler, TypeHandlerRegistry};
use crate::schema::{CellValidator, FnGetter, FnSetter, RecordSchema, SpecAttribute};
use crate::spec::{
    AttributeDescriptor, EnumAccessMode, EnumDefaultValueSource, EnumDirection, MappingError,
    Result, SpecDefaultValueMeta, SpecMappingOptions, TypeDecl,
};

bitflags! {
    /// Conversion and access method flags of one analysis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AnalysisFlags: u8 {
        /// Convert scalars with the registered type handler.
        const USE_HANDLER = 1 << 0;
        /// Convert with the expression evaluator.
        const USE_EXPRESSION = 1 << 1;
        /// Read/assign the field directly.
        const FIELD_ACCESS = 1 << 2;
        /// Go through an accessor.
        const ACCESSOR_METHOD = 1 << 3;
    }
}

/// Immutable per-attribute, per-direction conversion plan.
#[derive(Clone)]
pub struct Analysis {
    /// Attribute identity.
    pub descriptor: AttributeDescriptor,
    /// Direction this plan serves.
    pub direction: EnumDirection,
    /// Exactly one conversion flag and one access flag.
    pub flags: AnalysisFlags,
    /// Resolved default value.
    pub default_meta: SpecDefaultValueMeta,
    /// Handler of the terminal scalar type, if registered.
    pub handler: Option<Arc<dyn TypeHandler>>,
    /// Validators applied to raw text on read.
    pub validators: Vec<Arc<dyn CellValidator>>,
    /// Container shape of the declared type.
    pub shape: ShapeNode,
    /// Context passed to the handler.
    pub context: SpecAttributeContext,
    /// Expression for this direction when [`AnalysisFlags::USE_EXPRESSION`] is set.
    pub expression: Option<String>,
    /// Column header.
    pub header: String,
}

impl Analysis {
    /// Whether scalars go through the type handler.
    pub fn uses_handler(&self) -> bool {
        self.flags.contains(AnalysisFlags::USE_HANDLER)
    }

    /// Whether values go through the expression evaluator.
    pub fn uses_expression(&self) -> bool {
        self.flags.contains(AnalysisFlags::USE_EXPRESSION)
    }

    /// Whether values are reached through an accessor.
    pub fn uses_accessor(&self) -> bool {
        self.flags.contains(AnalysisFlags::ACCESSOR_METHOD)
    }
}

impl fmt::Debug for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analysis")
            .field("attribute", &self.descriptor.name)
            .field("direction", &self.direction)
            .field("flags", &self.flags)
            .field("default_meta", &self.default_meta)
            .field("handler", &self.handler)
            .field("validators", &self.validators.len())
            .field("shape", &self.shape)
            .field("expression", &self.expression)
            .field("header", &self.header)
            .finish()
    }
}

/// Analysis together with the value closure chosen for its direction.
pub struct AttributeBinding<R> {
    /// Conversion plan.
    pub analysis: Analysis,
    pub(crate) getter: Option<FnGetter<R>>,
    pub(crate) setter: Option<FnSetter<R>>,
}

impl<R> AttributeBinding<R> {
    /// Whether a setter is available (read direction).
    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Whether a getter is available (write direction).
    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }
}

impl<R> fmt::Debug for AttributeBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeBinding")
            .field("analysis", &self.analysis)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Analyzer bound to one registry and one set of options.
#[derive(Debug, Clone, Copy)]
pub struct AttributeAnalyzer<'a> {
    registry: &'a TypeHandlerRegistry,
    options: &'a SpecMappingOptions,
}

impl<'a> AttributeAnalyzer<'a> {
    /// Analyzer using `registry` and `options`.
    pub fn new(registry: &'a TypeHandlerRegistry, options: &'a SpecMappingOptions) -> Self {
        Self { registry, options }
    }

    /// Resolve the default value by precedence attribute > type > runtime > none.
    pub fn resolve_default(
        &self,
        descriptor: &AttributeDescriptor,
        default_attribute: Option<&str>,
        default_type: Option<&str>,
    ) -> SpecDefaultValueMeta {
        if let Some(value) = default_attribute {
            return SpecDefaultValueMeta::of(value, EnumDefaultValueSource::Attribute);
        }
        if let Some(value) = default_type {
            return SpecDefaultValueMeta::of(value, EnumDefaultValueSource::Type);
        }
        if let Some(value) = self
            .options
            .default_strategy
            .as_ref()
            .and_then(|strategy| strategy.default_for(descriptor))
        {
            return SpecDefaultValueMeta::of(value, EnumDefaultValueSource::RuntimeStrategy);
        }
        SpecDefaultValueMeta::none()
    }

    /// Analyze every attribute of `schema` for `direction`, in declaration order.
    pub fn analyze_all<R>(
        &self,
        schema: &RecordSchema<R>,
        direction: EnumDirection,
    ) -> Result<Vec<AttributeBinding<R>>> {
        schema
            .attributes()
            .iter()
            .zip(schema.descriptors())
            .map(|(attribute, descriptor)| {
                self.analyze(attribute, descriptor, schema.default_value(), direction)
            })
            .collect()
    }

    /// Analyze one attribute.
    pub fn analyze<R>(
        &self,
        attribute: &SpecAttribute<R>,
        descriptor: AttributeDescriptor,
        default_type: Option<&str>,
        direction: EnumDirection,
    ) -> Result<AttributeBinding<R>> {
        let config = attribute.attribute_config();
        let default_meta =
            self.resolve_default(&descriptor, config.default_value.as_deref(), default_type);

        let shape = build_shape(&descriptor.type_decl)?;
        let handler = self.registry.get_handler(shape.leaf());

        let expression = match direction {
            EnumDirection::Read => config.expression_read.clone(),
            EnumDirection::Write => config.expression_write.clone(),
        };
        let mut flags = if expression.is_some() {
            if self.options.expression_evaluator.is_none() {
                return Err(MappingError::configuration(format!(
                    "Attribute `{}` of `{}` declares an expression but no expression evaluator is configured.",
                    descriptor.name, descriptor.declaring_type
                )));
            }
            AnalysisFlags::USE_EXPRESSION
        } else {
            if handler.is_none() {
                tracing::warn!(
                    attribute = %descriptor.name,
                    type_name = %shape.leaf(),
                    "no type handler registered; values fall back to neutral/blank"
                );
            }
            AnalysisFlags::USE_HANDLER
        };

        let (getter, setter) = match direction {
            EnumDirection::Write => {
                let accessor = attribute.accessor_getter().filter(|accessor| {
                    self.is_conforming(accessor.if_visible, &accessor.type_decl, &descriptor)
                });
                let getter = match accessor {
                    Some(accessor) => {
                        flags |= AnalysisFlags::ACCESSOR_METHOD;
                        Some(Arc::clone(&accessor.func))
                    }
                    None => {
                        flags |= AnalysisFlags::FIELD_ACCESS;
                        attribute.field_getter().cloned()
                    }
                };
                if getter.is_none() {
                    return Err(MappingError::configuration(format!(
                        "Attribute `{}` of `{}` has no readable field or accessor.",
                        descriptor.name, descriptor.declaring_type
                    )));
                }
                (getter, None)
            }
            EnumDirection::Read => {
                let accessor = attribute.accessor_setter().filter(|accessor| {
                    self.is_conforming(accessor.if_visible, &accessor.type_decl, &descriptor)
                });
                let setter = match accessor {
                    Some(accessor) => {
                        flags |= AnalysisFlags::ACCESSOR_METHOD;
                        Some(Arc::clone(&accessor.func))
                    }
                    None => {
                        flags |= AnalysisFlags::FIELD_ACCESS;
                        attribute.field_setter().cloned()
                    }
                };
                (None, setter)
            }
        };

        let context = SpecAttributeContext::new(descriptor.clone(), shape.leaf().clone())
            .with_format(config.format.clone());

        tracing::debug!(
            attribute = %descriptor.name,
            declaring_type = %descriptor.declaring_type,
            direction = ?direction,
            flags = ?flags,
            default_source = ?default_meta.source,
            "analyzed attribute"
        );

        Ok(AttributeBinding {
            analysis: Analysis {
                header: attribute.header_text().to_string(),
                descriptor,
                direction,
                flags,
                default_meta,
                handler,
                validators: config.validators.clone(),
                shape,
                context,
                expression,
            },
            getter,
            setter,
        })
    }

    fn is_conforming(
        &self,
        if_visible: bool,
        type_decl: &TypeDecl,
        descriptor: &AttributeDescriptor,
    ) -> bool {
        self.options.rule_access == EnumAccessMode::Accessor
            && if_visible
            && *type_decl == descriptor.type_decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ExpressionEvaluator;
    use crate::schema::SpecAttribute;
    use crate::spec::{SpecEnumType, TypeKey};
    use crate::value::{Scope, Value};

    #[derive(Debug, Default)]
    struct Item {
        code: String,
        qty: i32,
        tags: Vec<String>,
    }

    fn item_schema() -> RecordSchema<Item> {
        RecordSchema::builder("Item")
            .default_value("n/a")
            .attribute(
                SpecAttribute::new("code", TypeKey::String)
                    .field(|it: &Item| it.code.clone(), |it, v| it.code = v)
                    .accessor_get(TypeKey::String, true, |it: &Item| it.code.to_uppercase())
                    .default_value("X-0"),
            )
            .attribute(
                SpecAttribute::new("qty", TypeKey::I32)
                    .field(|it: &Item| it.qty, |it, v| it.qty = v)
                    .accessor_get(TypeKey::I64, true, |it: &Item| i64::from(it.qty)),
            )
            .attribute(
                SpecAttribute::new("tags", TypeDecl::list(TypeDecl::class(TypeKey::String)))
                    .field(|it: &Item| it.tags.clone(), |it, v| it.tags = v)
                    .accessor_get(
                        TypeDecl::list(TypeDecl::class(TypeKey::String)),
                        false,
                        |it: &Item| it.tags.clone(),
                    ),
            )
            .default_constructor()
            .build()
            .unwrap()
    }

    #[test]
    fn flags_hold_one_conversion_and_one_access_method() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions::default();
        let analyzer = AttributeAnalyzer::new(&registry, &options);

        for direction in [EnumDirection::Read, EnumDirection::Write] {
            for binding in analyzer.analyze_all(&item_schema(), direction).unwrap() {
                let flags = binding.analysis.flags;
                let n_conversion = (flags
                    & (AnalysisFlags::USE_HANDLER | AnalysisFlags::USE_EXPRESSION))
                    .bits()
                    .count_ones();
                let n_access = (flags
                    & (AnalysisFlags::FIELD_ACCESS | AnalysisFlags::ACCESSOR_METHOD))
                    .bits()
                    .count_ones();
                assert_eq!((n_conversion, n_access), (1, 1), "{flags:?}");
            }
        }
    }

    #[test]
    fn accessor_requires_request_exact_type_and_visibility() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions {
            rule_access: EnumAccessMode::Accessor,
            ..SpecMappingOptions::default()
        };
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let l_bindings = analyzer
            .analyze_all(&item_schema(), EnumDirection::Write)
            .unwrap();

        assert!(l_bindings[0].analysis.uses_accessor());
        // i64 accessor does not match the i32 declaration.
        assert!(!l_bindings[1].analysis.uses_accessor());
        // hidden accessor
        assert!(!l_bindings[2].analysis.uses_accessor());

        let getter = l_bindings[0].getter.as_ref().unwrap();
        let item = Item {
            code: "ab".to_string(),
            ..Item::default()
        };
        assert_eq!(getter(&item), Value::Str("AB".to_string()));
    }

    #[test]
    fn field_access_is_used_when_accessors_are_not_requested() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions::default();
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let l_bindings = analyzer
            .analyze_all(&item_schema(), EnumDirection::Write)
            .unwrap();
        assert!(l_bindings.iter().all(|b| !b.analysis.uses_accessor()));
    }

    #[test]
    fn default_precedence_is_attribute_then_type_then_runtime() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions {
            default_strategy: Some(Arc::new(|_: &AttributeDescriptor| Some("rt".to_string()))),
            ..SpecMappingOptions::default()
        };
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let l_bindings = analyzer
            .analyze_all(&item_schema(), EnumDirection::Read)
            .unwrap();

        assert_eq!(
            l_bindings[0].analysis.default_meta,
            SpecDefaultValueMeta::of("X-0", EnumDefaultValueSource::Attribute)
        );
        assert_eq!(
            l_bindings[1].analysis.default_meta,
            SpecDefaultValueMeta::of("n/a", EnumDefaultValueSource::Type)
        );

        let descriptor = l_bindings[1].analysis.descriptor.clone();
        assert_eq!(
            analyzer.resolve_default(&descriptor, None, None),
            SpecDefaultValueMeta::of("rt", EnumDefaultValueSource::RuntimeStrategy)
        );
        let plain_options = SpecMappingOptions::default();
        let analyzer_plain = AttributeAnalyzer::new(&registry, &plain_options);
        assert_eq!(
            analyzer_plain.resolve_default(&descriptor, None, None),
            SpecDefaultValueMeta::none()
        );
    }

    #[test]
    fn expression_takes_precedence_over_handler() {
        let registry = TypeHandlerRegistry::builtin();
        let evaluator: Arc<dyn ExpressionEvaluator> =
            Arc::new(|_: &str, _: &Scope| Ok::<_, String>(Value::Int(1)));
        let options = SpecMappingOptions {
            expression_evaluator: Some(evaluator),
            ..SpecMappingOptions::default()
        };
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let schema = RecordSchema::<Item>::builder("Item")
            .attribute(
                SpecAttribute::new("qty", TypeKey::I32)
                    .field(|it: &Item| it.qty, |it, v| it.qty = v)
                    .expression_read("qty * 2"),
            )
            .build()
            .unwrap();

        let binding_read = &analyzer.analyze_all(&schema, EnumDirection::Read).unwrap()[0];
        assert!(binding_read.analysis.uses_expression());
        assert!(binding_read.analysis.handler.is_some());
        assert_eq!(binding_read.analysis.expression.as_deref(), Some("qty * 2"));

        let binding_write = &analyzer.analyze_all(&schema, EnumDirection::Write).unwrap()[0];
        assert!(binding_write.analysis.uses_handler());
    }

    #[test]
    fn expression_without_evaluator_is_a_configuration_error() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions::default();
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let schema = RecordSchema::<Item>::builder("Item")
            .attribute(
                SpecAttribute::new("qty", TypeKey::I32)
                    .field(|it: &Item| it.qty, |it, v| it.qty = v)
                    .expression_write("qty"),
            )
            .build()
            .unwrap();
        assert!(matches!(
            analyzer.analyze_all(&schema, EnumDirection::Write),
            Err(MappingError::Configuration(_))
        ));
    }

    #[test]
    fn unhandled_and_enum_types_are_tolerated() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions::default();
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let color = TypeKey::Enum(SpecEnumType::new("Color", ["RED"]));
        let schema = RecordSchema::<Item>::builder("Item")
            .attribute(
                SpecAttribute::new("blob", TypeKey::Named("Blob".to_string()))
                    .field_get(|_: &Item| Value::Null),
            )
            .attribute(
                SpecAttribute::new("colors", TypeDecl::array(TypeDecl::class(color.clone())))
                    .field_get(|_: &Item| Vec::<String>::new()),
            )
            .build()
            .unwrap();

        let l_bindings = analyzer.analyze_all(&schema, EnumDirection::Write).unwrap();
        assert!(l_bindings[0].analysis.uses_handler());
        assert!(l_bindings[0].analysis.handler.is_none());
        assert!(l_bindings[1].analysis.handler.is_some());
        assert_eq!(l_bindings[1].analysis.context.element_key, color);
    }

    #[test]
    fn write_analysis_requires_a_getter() {
        let registry = TypeHandlerRegistry::builtin();
        let options = SpecMappingOptions::default();
        let analyzer = AttributeAnalyzer::new(&registry, &options);
        let schema = RecordSchema::<Item>::builder("Item")
            .attribute(SpecAttribute::new("qty", TypeKey::I32))
            .build()
            .unwrap();
        assert!(matches!(
            analyzer.analyze_all(&schema, EnumDirection::Write),
            Err(MappingError::Configuration(_))
        ));
        assert!(analyzer.analyze_all(&schema, EnumDirection::Read).is_ok());
    }
}
