//! Container type resolver.
//!
//! Classifies declared attribute types as concrete, array or iterable and
//! unwraps type variables, wildcards and generic arrays on the way. The walk
//! runs once per attribute while analyzing a schema; the resulting
//! [`ShapeNode`] tree is what converters follow per value.

use crate::conf::{C_TYPE_NAME_TOP, N_RESOLVE_STEPS_MAX};
use crate::spec::{
    EnumContainerKind, MappingError, RawType, Result, SpecContainerClassification, TypeDecl,
    TypeKey,
};

/// Fully resolved container shape of an attribute type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeNode {
    /// Scalar handled by the handler registered for the key.
    Concrete(TypeKey),
    /// Array whose elements have the inner shape.
    Array(Box<ShapeNode>),
    /// Iterable whose elements have the inner shape.
    Iterable(Box<ShapeNode>),
}

impl ShapeNode {
    /// Container kind of the outermost level.
    pub fn kind(&self) -> EnumContainerKind {
        match self {
            Self::Concrete(_) => EnumContainerKind::Concrete,
            Self::Array(_) => EnumContainerKind::Array,
            Self::Iterable(_) => EnumContainerKind::Iterable,
        }
    }

    /// Element shape one level down, `None` for concrete shapes.
    pub fn element(&self) -> Option<&ShapeNode> {
        match self {
            Self::Concrete(_) => None,
            Self::Array(inner) | Self::Iterable(inner) => Some(inner),
        }
    }

    /// Terminal scalar key.
    pub fn leaf(&self) -> &TypeKey {
        let mut node = self;
        loop {
            match node {
                Self::Concrete(key) => return key,
                Self::Array(inner) | Self::Iterable(inner) => node = inner,
            }
        }
    }

    /// Number of container levels above the leaf.
    pub fn depth(&self) -> usize {
        let mut n_depth = 0;
        let mut node = self;
        while let Some(inner) = node.element() {
            n_depth += 1;
            node = inner;
        }
        n_depth
    }

    /// Whether the outermost level is an array or iterable.
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Concrete(_))
    }
}

fn derive_top_type() -> TypeDecl {
    TypeDecl::Class(TypeKey::Named(C_TYPE_NAME_TOP.to_string()))
}

/// Classify `type_decl` one container level deep.
pub fn classify(type_decl: &TypeDecl) -> Result<SpecContainerClassification> {
    let mut current = type_decl;
    let top_type = derive_top_type();

    for _ in 0..N_RESOLVE_STEPS_MAX {
        match current {
            TypeDecl::Class(key) => {
                return Ok(SpecContainerClassification {
                    kind: EnumContainerKind::Concrete,
                    element_type: TypeDecl::Class(key.clone()),
                });
            }
            TypeDecl::Array(component) | TypeDecl::GenericArray(component) => {
                return Ok(SpecContainerClassification {
                    kind: EnumContainerKind::Array,
                    element_type: (**component).clone(),
                });
            }
            TypeDecl::Variable { name, bounds } => {
                current = bounds.first().unwrap_or(&top_type);
                tracing::trace!(variable = %name, bound = %current, "unwrapped type variable");
            }
            TypeDecl::Parameterized { raw, args } => match raw {
                RawType::Sequence(name) => {
                    let Some(element_type) = args.first() else {
                        return Err(MappingError::configuration(format!(
                            "Sequence type `{name}` declares no element type."
                        )));
                    };
                    return Ok(SpecContainerClassification {
                        kind: EnumContainerKind::Iterable,
                        element_type: element_type.clone(),
                    });
                }
                RawType::Class(key) => {
                    return Ok(SpecContainerClassification {
                        kind: EnumContainerKind::Concrete,
                        element_type: TypeDecl::Class(key.clone()),
                    });
                }
            },
            TypeDecl::Wildcard { lower, upper } => {
                current = match lower {
                    Some(lower) => &**lower,
                    None => upper.first().unwrap_or(&top_type),
                };
            }
        }
    }

    Err(MappingError::configuration(format!(
        "Type `{type_decl}` did not resolve within {N_RESOLVE_STEPS_MAX} steps; check for cyclic bounds."
    )))
}

/// Resolve the terminal reified class of `type_decl`.
///
/// Descends through every array/iterable level; used to pick the scalar
/// handler of deeply nested element types.
pub fn resolve_concrete_type(type_decl: &TypeDecl) -> Result<TypeKey> {
    Ok(build_shape(type_decl)?.leaf().clone())
}

/// Build the full shape tree of `type_decl`.
pub fn build_shape(type_decl: &TypeDecl) -> Result<ShapeNode> {
    let mut l_levels = Vec::new();
    let mut current = type_decl.clone();

    for _ in 0..N_RESOLVE_STEPS_MAX {
        let classification = classify(&current)?;
        match classification.kind {
            EnumContainerKind::Concrete => {
                let TypeDecl::Class(key) = classification.element_type else {
                    return Err(MappingError::Invariant(format!(
                        "Concrete classification of `{current}` is not a class."
                    )));
                };
                let shape_node = l_levels.into_iter().rev().fold(
                    ShapeNode::Concrete(key),
                    |inner, kind| match kind {
                        EnumContainerKind::Array => ShapeNode::Array(Box::new(inner)),
                        _ => ShapeNode::Iterable(Box::new(inner)),
                    },
                );
                return Ok(shape_node);
            }
            kind => {
                l_levels.push(kind);
                current = classification.element_type;
            }
        }
    }

    Err(MappingError::configuration(format!(
        "Type `{type_decl}` nests deeper than {N_RESOLVE_STEPS_MAX} levels."
    )))
}
