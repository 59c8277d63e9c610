//! Model creator resolver.
//!
//! Picks the constructor or factory used to instantiate records while reading
//! and binds each of its parameters to exactly one attribute. All failures are
//! configuration errors raised before any row is read.

use std::collections::BTreeSet;
use std::fmt;

use crate::schema::{CreatorArgs, EnumCreatorKind, FnCreate, RecordSchema, SpecCreator};
use crate::spec::{MappingError, Result, SpecResolvedParameter};
use crate::value::Value;

/// How a creator parameter found its attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumParamBinding {
    /// The parameter type is unique among parameters and attributes.
    ByType,
    /// The parameter name matches the attribute name.
    ByName,
}

/// One creator parameter bound to an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecParamBinding {
    /// Resolved parameter.
    pub parameter: SpecResolvedParameter,
    /// Bound attribute name.
    pub attribute: String,
    /// Bound attribute position in the schema.
    pub attribute_index: usize,
    /// Binding mode.
    pub mode: EnumParamBinding,
}

/// Creator selected for a record type, with verified parameter bindings.
pub struct ResolvedCreator<R> {
    kind: EnumCreatorKind,
    name: String,
    bindings: Vec<SpecParamBinding>,
    func: FnCreate<R>,
}

impl<R> ResolvedCreator<R> {
    /// Creator flavour.
    pub fn kind(&self) -> EnumCreatorKind {
        self.kind
    }

    /// Creator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter bindings in parameter order.
    pub fn bindings(&self) -> &[SpecParamBinding] {
        &self.bindings
    }

    /// Resolved parameters in parameter order.
    pub fn parameters(&self) -> Vec<SpecResolvedParameter> {
        self.bindings
            .iter()
            .map(|binding| binding.parameter.clone())
            .collect()
    }

    /// Whether attribute `attribute_index` is passed to the creator.
    pub fn is_bound(&self, attribute_index: usize) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.attribute_index == attribute_index)
    }

    /// Invoke the creator with per-attribute decoded `values`.
    pub fn create(&self, values: &[Value]) -> std::result::Result<R, String> {
        let l_args = self
            .bindings
            .iter()
            .map(|binding| {
                values
                    .get(binding.attribute_index)
                    .cloned()
                    .ok_or_else(|| format!("no decoded value for `{}`", binding.attribute))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        (self.func)(CreatorArgs::new(l_args))
    }
}

impl<R> fmt::Debug for ResolvedCreator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCreator")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .finish()
    }
}

fn select_creator<R>(schema: &RecordSchema<R>) -> Result<&SpecCreator<R>> {
    let type_name = schema.type_name();
    let l_factories: Vec<_> = schema
        .creators()
        .iter()
        .filter(|c| c.is_marked() && c.kind() == EnumCreatorKind::Factory)
        .collect();
    let l_constructors: Vec<_> = schema
        .creators()
        .iter()
        .filter(|c| c.is_marked() && c.kind() == EnumCreatorKind::Constructor)
        .collect();

    match (l_factories.as_slice(), l_constructors.as_slice()) {
        ([factory], []) => Ok(*factory),
        ([], [constructor]) => Ok(*constructor),
        ([], []) => schema
            .creators()
            .iter()
            .find(|c| c.kind() == EnumCreatorKind::Constructor && c.params().is_empty())
            .ok_or_else(|| {
                MappingError::configuration(format!(
                    "Record type `{type_name}` has no marked creator and no no-argument constructor."
                ))
            }),
        (l_f, l_c) if !l_f.is_empty() && !l_c.is_empty() => {
            Err(MappingError::configuration(format!(
                "Record type `{type_name}` marks both a factory (`{}`) and a constructor (`{}`).",
                l_f[0].name(),
                l_c[0].name()
            )))
        }
        (l_f, l_c) => {
            let l_names: Vec<&str> = l_f.iter().chain(l_c.iter()).map(|c| c.name()).collect();
            Err(MappingError::configuration(format!(
                "Record type `{type_name}` marks more than one creator: {}.",
                l_names.join(", ")
            )))
        }
    }
}

/// Select and verify the creator of `schema`.
pub fn resolve_creator<R>(schema: &RecordSchema<R>) -> Result<ResolvedCreator<R>> {
    let creator = select_creator(schema)?;
    let type_name = schema.type_name();
    let descriptors = schema.descriptors();
    let params = creator.params();

    let mut bindings = Vec::with_capacity(params.len());
    let mut set_bound = BTreeSet::new();
    for (n_idx, param) in params.iter().enumerate() {
        let c_param = param.name.as_deref().unwrap_or("<unnamed>");
        let l_same_type: Vec<_> = descriptors
            .iter()
            .filter(|desc| desc.type_decl == param.type_decl)
            .collect();
        if l_same_type.is_empty() {
            return Err(MappingError::configuration(format!(
                "Parameter {n_idx} (`{c_param}`) of creator `{}` on `{type_name}` has type `{}`, which no attribute declares.",
                creator.name(),
                param.type_decl
            )));
        }
        let n_params_same_type = params
            .iter()
            .filter(|other| other.type_decl == param.type_decl)
            .count();

        let (descriptor, mode) = if n_params_same_type == 1 && l_same_type.len() == 1 {
            (l_same_type[0], EnumParamBinding::ByType)
        } else {
            let Some(c_name) = param.name.as_deref() else {
                return Err(MappingError::configuration(format!(
                    "Parameter {n_idx} of creator `{}` on `{type_name}` shares type `{}` with other parameters or attributes and has no name.",
                    creator.name(),
                    param.type_decl
                )));
            };
            let l_named: Vec<_> = l_same_type
                .iter()
                .filter(|desc| desc.name == c_name)
                .collect();
            match l_named.as_slice() {
                [descriptor] => (**descriptor, EnumParamBinding::ByName),
                _ => {
                    return Err(MappingError::configuration(format!(
                        "Parameter `{c_name}` of creator `{}` on `{type_name}` matches no attribute of type `{}` by name.",
                        creator.name(),
                        param.type_decl
                    )));
                }
            }
        };

        if !set_bound.insert(descriptor.index) {
            return Err(MappingError::configuration(format!(
                "Attribute `{}` of `{type_name}` is bound to more than one parameter of creator `{}`.",
                descriptor.name,
                creator.name()
            )));
        }

        bindings.push(SpecParamBinding {
            parameter: SpecResolvedParameter {
                name: param.name.clone(),
                type_decl: param.type_decl.clone(),
                index: n_idx,
                if_explicitly_named: param.if_explicit_name,
            },
            attribute: descriptor.name.clone(),
            attribute_index: descriptor.index,
            mode,
        });
    }

    tracing::debug!(
        record_type = %type_name,
        creator = creator.name(),
        kind = ?creator.kind(),
        bindings = ?bindings.iter().map(|b| (b.attribute.as_str(), b.mode)).collect::<Vec<_>>(),
        "resolved model creator"
    );

    Ok(ResolvedCreator {
        kind: creator.kind(),
        name: creator.name().to_string(),
        bindings,
        func: creator.func().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SpecAttribute, SpecCreator, SpecCreatorParam};
    use crate::spec::TypeKey;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        first: String,
        last: String,
        age: i32,
    }

    fn person_builder() -> crate::schema::RecordSchemaBuilder<Person> {
        RecordSchema::builder("Person")
            .attribute(
                SpecAttribute::new("first", TypeKey::String)
                    .field_get(|p: &Person| p.first.clone()),
            )
            .attribute(
                SpecAttribute::new("last", TypeKey::String).field_get(|p: &Person| p.last.clone()),
            )
            .attribute(SpecAttribute::new("age", TypeKey::I32).field_get(|p: &Person| p.age))
    }

    fn person_ctor(name: &str) -> SpecCreator<Person> {
        SpecCreator::constructor(name, |mut args: CreatorArgs| {
            Ok(Person {
                last: args.take(0)?,
                first: args.take(1)?,
                age: args.take(2)?,
            })
        })
    }

    #[test]
    fn unique_types_bind_by_type_and_shared_types_by_name() {
        let schema = person_builder()
            .creator(
                person_ctor("new")
                    .param(SpecCreatorParam::named("last", TypeKey::String))
                    .param(SpecCreatorParam::inferred("first", TypeKey::String))
                    .param(SpecCreatorParam::inferred("years", TypeKey::I32))
                    .marked(),
            )
            .build()
            .unwrap();
        let creator = resolve_creator(&schema).unwrap();
        let l_modes: Vec<_> = creator
            .bindings()
            .iter()
            .map(|b| (b.attribute.as_str(), b.mode))
            .collect();
        assert_eq!(
            l_modes,
            vec![
                ("last", EnumParamBinding::ByName),
                ("first", EnumParamBinding::ByName),
                ("age", EnumParamBinding::ByType),
            ]
        );
        assert!(creator.parameters()[0].if_explicitly_named);
        assert!(!creator.is_bound(3));

        let values = vec![
            Value::Str("Ada".to_string()),
            Value::Str("Lovelace".to_string()),
            Value::Int(36),
        ];
        assert_eq!(
            creator.create(&values).unwrap(),
            Person {
                first: "Ada".to_string(),
                last: "Lovelace".to_string(),
                age: 36,
            }
        );
    }

    #[test]
    fn same_typed_parameters_without_matching_names_are_rejected() {
        let schema = person_builder()
            .creator(
                person_ctor("new")
                    .param(SpecCreatorParam::unnamed(TypeKey::String))
                    .param(SpecCreatorParam::unnamed(TypeKey::String))
                    .param(SpecCreatorParam::unnamed(TypeKey::I32))
                    .marked(),
            )
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));

        let schema = person_builder()
            .creator(
                person_ctor("new")
                    .param(SpecCreatorParam::inferred("given", TypeKey::String))
                    .param(SpecCreatorParam::inferred("family", TypeKey::String))
                    .marked(),
            )
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let schema = person_builder()
            .creator(
                person_ctor("new")
                    .param(SpecCreatorParam::named("first", TypeKey::String))
                    .param(SpecCreatorParam::named("first", TypeKey::String))
                    .marked(),
            )
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));
    }

    #[test]
    fn parameter_types_must_be_attribute_types() {
        let schema = person_builder()
            .creator(
                person_ctor("new")
                    .param(SpecCreatorParam::named("age", TypeKey::I64))
                    .marked(),
            )
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));
    }

    #[test]
    fn marked_factory_wins_and_double_marking_is_ambiguous() {
        let schema = person_builder()
            .default_constructor()
            .creator(SpecCreator::factory("of", |_| Ok(Person::default())).marked())
            .build()
            .unwrap();
        let creator = resolve_creator(&schema).unwrap();
        assert_eq!((creator.kind(), creator.name()), (EnumCreatorKind::Factory, "of"));

        let schema = person_builder()
            .creator(SpecCreator::factory("of", |_| Ok(Person::default())).marked())
            .creator(SpecCreator::constructor("new", |_| Ok(Person::default())).marked())
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));

        let schema = person_builder()
            .creator(SpecCreator::factory("of", |_| Ok(Person::default())).marked())
            .creator(SpecCreator::factory("parse", |_| Ok(Person::default())).marked())
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));
    }

    #[test]
    fn unmarked_schemas_need_a_no_argument_constructor() {
        let schema = person_builder().default_constructor().build().unwrap();
        let creator = resolve_creator(&schema).unwrap();
        assert!(creator.bindings().is_empty());
        assert_eq!(creator.create(&[]).unwrap(), Person::default());

        let schema = person_builder()
            .creator(person_ctor("new").param(SpecCreatorParam::named("age", TypeKey::I32)))
            .build()
            .unwrap();
        assert!(matches!(
            resolve_creator(&schema),
            Err(MappingError::Configuration(_))
        ));
    }
}
