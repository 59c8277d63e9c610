//! Scalar type handlers and the handler registry.
//!
//! Registration happens on a [`TypeHandlerRegistryBuilder`]; [`build`] freezes
//! it into a [`TypeHandlerRegistry`] that is shared read-only afterwards.
//!
//! [`build`]: TypeHandlerRegistryBuilder::build

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::builtin::{EnumHandler, register_builtin_handlers};
use crate::spec::{AttributeDescriptor, MappingError, Result, TypeKey};
use crate::value::Value;

/// Per-attribute information available to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecAttributeContext {
    /// Attribute being converted.
    pub attribute: AttributeDescriptor,
    /// Scalar type at the current nesting level.
    pub element_key: TypeKey,
    /// Declared format pattern (date/time patterns and the like).
    pub format: Option<String>,
}

impl SpecAttributeContext {
    /// Context for `attribute` at scalar type `element_key`.
    pub fn new(attribute: AttributeDescriptor, element_key: TypeKey) -> Self {
        Self {
            attribute,
            element_key,
            format: None,
        }
    }

    /// Attach a format pattern.
    pub fn with_format(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }
}

/// Pluggable scalar codec between a [`Value`] and its cell text.
pub trait TypeHandler: Send + Sync {
    /// Type this handler is registered for by [`TypeHandlerRegistryBuilder::add`].
    fn handled_type(&self) -> TypeKey;

    /// Encode a non-null value to cell text.
    fn encode(
        &self,
        value: &Value,
        ctx: &SpecAttributeContext,
    ) -> std::result::Result<String, String>;

    /// Decode non-blank cell text to a value.
    fn decode(&self, text: &str, ctx: &SpecAttributeContext) -> std::result::Result<Value, String>;
}

impl fmt::Debug for dyn TypeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandler<{}>", self.handled_type())
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region RegistryBuilder

/// Mutable handler registry used during setup.
#[derive(Default, Clone)]
pub struct TypeHandlerRegistryBuilder {
    dict_handlers: HashMap<TypeKey, Arc<dyn TypeHandler>>,
}

impl TypeHandlerRegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with the built-in scalar handlers.
    pub fn with_builtin() -> Self {
        let mut builder = Self::new();
        register_builtin_handlers(&mut builder);
        builder
    }

    /// Register `handler` under its own [`TypeHandler::handled_type`].
    ///
    /// Returns whether the type was previously unregistered.
    pub fn add<H>(&mut self, handler: H) -> Result<bool>
    where
        H: TypeHandler + 'static,
    {
        let key = handler.handled_type();
        self.add_for(key, Arc::new(handler))
    }

    /// Register `handler` under `key`, replacing any previous mapping.
    ///
    /// Returns whether the type was previously unregistered.
    pub fn add_for(&mut self, key: TypeKey, handler: Arc<dyn TypeHandler>) -> Result<bool> {
        if key.is_absent() {
            return Err(MappingError::configuration(
                "Cannot register a type handler for an absent type.",
            ));
        }
        tracing::debug!(type_name = %key, "registered type handler");
        Ok(self.dict_handlers.insert(key, handler).is_none())
    }

    pub(crate) fn insert_builtin(&mut self, handler: Arc<dyn TypeHandler>) {
        self.dict_handlers.insert(handler.handled_type(), handler);
    }

    /// Merge every mapping of `registry`, overriding existing ones.
    pub fn add_all(&mut self, registry: &TypeHandlerRegistry) {
        for (key, handler) in registry.dict_handlers.iter() {
            self.dict_handlers.insert(key.clone(), Arc::clone(handler));
        }
    }

    /// Handler registered for exactly `key`.
    pub fn get_handler(&self, key: &TypeKey) -> Option<Arc<dyn TypeHandler>> {
        self.dict_handlers.get(key).cloned()
    }

    /// Registered types (possibly empty).
    pub fn all_types(&self) -> BTreeSet<TypeKey> {
        self.dict_handlers.keys().cloned().collect()
    }

    /// Freeze into an immutable, shareable registry.
    pub fn build(self) -> TypeHandlerRegistry {
        TypeHandlerRegistry {
            dict_handlers: Arc::new(self.dict_handlers),
            handler_enum_fallback: Arc::new(EnumHandler),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FrozenRegistry

/// Immutable handler registry; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct TypeHandlerRegistry {
    dict_handlers: Arc<HashMap<TypeKey, Arc<dyn TypeHandler>>>,
    handler_enum_fallback: Arc<dyn TypeHandler>,
}

impl TypeHandlerRegistry {
    /// Registry with only the built-in handlers.
    pub fn builtin() -> Self {
        TypeHandlerRegistryBuilder::with_builtin().build()
    }

    /// Handler for `key`.
    ///
    /// Lookup is exact; enum types without their own handler fall back to the
    /// generic enum handler.
    pub fn get_handler(&self, key: &TypeKey) -> Option<Arc<dyn TypeHandler>> {
        if let Some(handler) = self.dict_handlers.get(key) {
            return Some(Arc::clone(handler));
        }
        match key {
            TypeKey::Enum(_) => Some(Arc::clone(&self.handler_enum_fallback)),
            _ => None,
        }
    }

    /// Whether `key` has an exact registration.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.dict_handlers.contains_key(key)
    }

    /// Registered types (possibly empty).
    pub fn all_types(&self) -> BTreeSet<TypeKey> {
        self.dict_handlers.keys().cloned().collect()
    }

    /// Copy mappings into a new builder for further registration.
    pub fn to_builder(&self) -> TypeHandlerRegistryBuilder {
        let mut builder = TypeHandlerRegistryBuilder::new();
        builder.add_all(self);
        builder
    }
}

impl Default for TypeHandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandlerRegistry")
            .field("types", &self.all_types())
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{SpecEnumType, TypeDecl};

    struct MoneyHandler {
        prefix: &'static str,
    }

    impl TypeHandler for MoneyHandler {
        fn handled_type(&self) -> TypeKey {
            TypeKey::Named("Money".to_string())
        }

        fn encode(
            &self,
            value: &Value,
            _ctx: &SpecAttributeContext,
        ) -> std::result::Result<String, String> {
            match value {
                Value::Int(cents) => Ok(format!("{}{cents}", self.prefix)),
                other => Err(format!("unexpected {}", other.kind_name())),
            }
        }

        fn decode(
            &self,
            text: &str,
            _ctx: &SpecAttributeContext,
        ) -> std::result::Result<Value, String> {
            text.trim_start_matches(self.prefix)
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|err| err.to_string())
        }
    }

    fn money_ctx() -> SpecAttributeContext {
        let key = TypeKey::Named("Money".to_string());
        SpecAttributeContext::new(
            AttributeDescriptor {
                name: "price".to_string(),
                declaring_type: "Item".to_string(),
                type_decl: TypeDecl::class(key.clone()),
                index: 0,
            },
            key,
        )
    }

    #[test]
    fn add_reports_first_registration_and_overrides_later_ones() {
        let mut builder = TypeHandlerRegistryBuilder::new();
        assert!(builder.all_types().is_empty());
        assert_eq!(builder.add(MoneyHandler { prefix: "$" }), Ok(true));
        assert_eq!(builder.add(MoneyHandler { prefix: "EUR" }), Ok(false));

        let registry = builder.build();
        let key = TypeKey::Named("Money".to_string());
        let handler = registry.get_handler(&key).unwrap();
        assert_eq!(handler.encode(&Value::Int(5), &money_ctx()).unwrap(), "EUR5");
    }

    #[test]
    fn absent_type_registration_is_a_configuration_error() {
        let mut builder = TypeHandlerRegistryBuilder::new();
        let err = builder
            .add_for(
                TypeKey::Named(String::new()),
                Arc::new(MoneyHandler { prefix: "$" }),
            )
            .unwrap_err();
        assert!(matches!(err, MappingError::Configuration(_)));
    }

    #[test]
    fn lookup_is_exact_with_enum_fallback() {
        let registry = TypeHandlerRegistry::builtin();
        assert!(registry.get_handler(&TypeKey::I32).is_some());
        assert!(
            registry
                .get_handler(&TypeKey::Named("Unknown".to_string()))
                .is_none()
        );

        let color = TypeKey::Enum(SpecEnumType::new("Color", ["RED"]));
        assert!(!registry.contains(&color));
        assert!(registry.get_handler(&color).is_some());
    }

    #[test]
    fn add_all_merges_with_override_semantics() {
        let mut builder_base = TypeHandlerRegistryBuilder::new();
        builder_base.add(MoneyHandler { prefix: "$" }).unwrap();
        let registry_base = builder_base.build();

        let mut builder = TypeHandlerRegistryBuilder::with_builtin();
        let n_types_builtin = builder.all_types().len();
        builder.add_all(&registry_base);
        let registry = builder.build();

        assert_eq!(registry.all_types().len(), n_types_builtin + 1);
        let handler = registry
            .get_handler(&TypeKey::Named("Money".to_string()))
            .unwrap();
        assert_eq!(handler.decode("$42", &money_ctx()), Ok(Value::Int(42)));
    }
}
