//! Read and write value converters.
//!
//! Each direction has two converters tried in a fixed order (handler-based,
//! then expression-based); the router dispatches to the first one whose
//! `supports` predicate accepts the analysis.

use std::sync::Arc;

use crate::analyzer::Analysis;
use crate::codec::SpecSequenceCodec;
use crate::container::ShapeNode;
use crate::spec::{MappingError, Result, SpecMappingOptions};
use crate::tabular::SpecRowScope;
use crate::value::{Scope, Value};

/// Optional expression-evaluation capability.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` against `scope`.
    fn evaluate(&self, expression: &str, scope: &Scope) -> std::result::Result<Value, String>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &Scope) -> std::result::Result<Value, String> + Send + Sync,
{
    fn evaluate(&self, expression: &str, scope: &Scope) -> std::result::Result<Value, String> {
        self(expression, scope)
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Neutral value of a blank cell: zero for primitives, empty sequence for containers.
pub fn derive_neutral_value(shape: &ShapeNode) -> Value {
    match shape {
        ShapeNode::Concrete(key) => Value::zero_of(key),
        ShapeNode::Array(_) | ShapeNode::Iterable(_) => Value::Seq(vec![]),
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region ShapeWalk

/// Decode non-blank `text` following `shape`.
pub fn decode_shape(
    codec: &SpecSequenceCodec,
    text: &str,
    shape: &ShapeNode,
    analysis: &Analysis,
) -> Result<Value> {
    match shape {
        ShapeNode::Concrete(key) => {
            let Some(handler) = &analysis.handler else {
                return Ok(Value::zero_of(key));
            };
            handler
                .decode(text, &analysis.context)
                .map_err(|message| MappingError::conversion(&analysis.descriptor, text, message))
        }
        ShapeNode::Array(inner) | ShapeNode::Iterable(inner) => {
            let l_tokens = codec.shallow_split(text.trim())?;
            let mut l_values = Vec::with_capacity(l_tokens.len());
            for token in &l_tokens {
                if is_blank(token) {
                    if inner.is_container() {
                        return Err(MappingError::conversion(
                            &analysis.descriptor,
                            text,
                            "nested sequence element must not be empty",
                        ));
                    }
                    l_values.push(derive_neutral_value(inner));
                    continue;
                }
                l_values.push(decode_shape(codec, token, inner, analysis)?);
            }
            Ok(Value::Seq(l_values))
        }
    }
}

/// Encode `value` following `shape`; `None` means nothing to write.
pub fn encode_shape(
    codec: &SpecSequenceCodec,
    value: &Value,
    shape: &ShapeNode,
    analysis: &Analysis,
) -> Result<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    match shape {
        ShapeNode::Concrete(_) => {
            let Some(handler) = &analysis.handler else {
                return Ok(None);
            };
            handler
                .encode(value, &analysis.context)
                .map(Some)
                .map_err(|message| {
                    MappingError::conversion(&analysis.descriptor, value.to_string(), message)
                })
        }
        ShapeNode::Array(inner) | ShapeNode::Iterable(inner) => {
            let Value::Seq(items) = value else {
                return Err(MappingError::conversion(
                    &analysis.descriptor,
                    value.to_string(),
                    format!("expected a sequence, got {}", value.kind_name()),
                ));
            };
            let mut l_tokens = Vec::with_capacity(items.len());
            for item in items {
                l_tokens.push(encode_shape(codec, item, inner, analysis)?.unwrap_or_default());
            }
            Ok(Some(codec.serialize(&l_tokens)))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Read

/// Converts one attribute's raw cell text into a value.
pub trait ReadConverter: Send + Sync {
    /// Whether this converter handles `analysis`.
    fn supports(&self, analysis: &Analysis) -> bool;

    /// Convert the attribute of `analysis` using the whole row scope.
    fn convert(&self, row: &SpecRowScope, analysis: &Analysis) -> Result<Value>;
}

fn check_validators(raw: &str, analysis: &Analysis) -> Result<()> {
    for validator in &analysis.validators {
        validator
            .validate(raw)
            .map_err(|message| MappingError::Validation {
                attribute: analysis.descriptor.name.clone(),
                raw: raw.to_string(),
                message,
            })?;
    }
    Ok(())
}

fn derive_raw<'a>(row: &'a SpecRowScope, analysis: &Analysis) -> &'a str {
    row.get(&analysis.descriptor.name)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Handler-based read path with bracketed-sequence support.
#[derive(Debug, Clone, Default)]
pub struct HandlerReadConverter {
    codec: SpecSequenceCodec,
}

impl HandlerReadConverter {
    /// Converter splitting sequences with `codec`.
    pub fn new(codec: SpecSequenceCodec) -> Self {
        Self { codec }
    }

    /// Convert raw cell text, applying default substitution on blank input.
    pub fn convert_raw(&self, raw: &str, analysis: &Analysis) -> Result<Value> {
        if is_blank(raw) {
            return match analysis.default_meta.value.as_deref() {
                Some(default) if !is_blank(default) => {
                    decode_shape(&self.codec, default, &analysis.shape, analysis)
                }
                _ => Ok(derive_neutral_value(&analysis.shape)),
            };
        }
        check_validators(raw, analysis)?;
        decode_shape(&self.codec, raw, &analysis.shape, analysis)
    }
}

impl ReadConverter for HandlerReadConverter {
    fn supports(&self, analysis: &Analysis) -> bool {
        analysis.uses_handler()
    }

    fn convert(&self, row: &SpecRowScope, analysis: &Analysis) -> Result<Value> {
        self.convert_raw(derive_raw(row, analysis), analysis)
    }
}

/// Expression-based read path.
///
/// The expression sees every raw cell of the row as a string variable; a blank
/// cell of the target attribute is replaced by its default first.
pub struct ExpressionReadConverter {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ExpressionReadConverter {
    /// Converter delegating to `evaluator`.
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl ReadConverter for ExpressionReadConverter {
    fn supports(&self, analysis: &Analysis) -> bool {
        analysis.uses_expression()
    }

    fn convert(&self, row: &SpecRowScope, analysis: &Analysis) -> Result<Value> {
        let Some(expression) = analysis.expression.as_deref() else {
            return Err(MappingError::Invariant(format!(
                "attribute `{}` is flagged for expressions but declares none",
                analysis.descriptor.name
            )));
        };

        let mut raw = derive_raw(row, analysis).to_string();
        if is_blank(&raw)
            && let Some(default) = analysis.default_meta.value.as_deref()
        {
            raw = default.to_string();
        }
        if !is_blank(&raw) {
            check_validators(&raw, analysis)?;
        }

        let mut scope: Scope = row
            .iter()
            .map(|(name, text)| (name.clone(), Value::Str(text.clone())))
            .collect();
        scope.insert(analysis.descriptor.name.clone(), Value::Str(raw.clone()));

        let value = self
            .evaluator
            .evaluate(expression, &scope)
            .map_err(|message| MappingError::conversion(&analysis.descriptor, raw, message))?;
        if value.is_null() {
            return Ok(derive_neutral_value(&analysis.shape));
        }
        Ok(value)
    }
}

/// Read-side router over the available converters.
pub struct ReadConverterRouter {
    l_converters: Vec<Box<dyn ReadConverter>>,
}

impl ReadConverterRouter {
    /// Router for `options`: handler converter first, then expression converter
    /// when an evaluator is configured.
    pub fn new(options: &SpecMappingOptions) -> Self {
        let mut l_converters: Vec<Box<dyn ReadConverter>> = vec![Box::new(
            HandlerReadConverter::new(options.sequence_codec.clone()),
        )];
        if let Some(evaluator) = &options.expression_evaluator {
            l_converters.push(Box::new(ExpressionReadConverter::new(Arc::clone(evaluator))));
        }
        Self { l_converters }
    }

    /// Dispatch to the first converter supporting `analysis`.
    pub fn convert(&self, row: &SpecRowScope, analysis: &Analysis) -> Result<Value> {
        let Some(converter) = self.l_converters.iter().find(|c| c.supports(analysis)) else {
            return Err(MappingError::Invariant(format!(
                "no read converter supports attribute `{}` ({:?})",
                analysis.descriptor.name, analysis.flags
            )));
        };
        converter.convert(row, analysis)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Write

/// Converts one extracted attribute value into cell text.
pub trait WriteConverter: Send + Sync {
    /// Whether this converter handles `analysis`.
    fn supports(&self, analysis: &Analysis) -> bool;

    /// Convert `value`; `scope` holds every attribute value of the record.
    fn convert(&self, value: &Value, scope: &Scope, analysis: &Analysis)
    -> Result<Option<String>>;
}

/// Replace an absent/empty result with the attribute's default.
///
/// The default is run through the same shape walk; a default the handler
/// cannot round-trip is written verbatim.
fn apply_write_default(
    codec: &SpecSequenceCodec,
    text: Option<String>,
    analysis: &Analysis,
) -> Result<Option<String>> {
    if let Some(text) = text.filter(|text| !text.is_empty()) {
        return Ok(Some(text));
    }
    let Some(default) = analysis
        .default_meta
        .value
        .as_deref()
        .filter(|default| !is_blank(default))
    else {
        return Ok(None);
    };
    let value = decode_shape(codec, default, &analysis.shape, analysis)?;
    let text = encode_shape(codec, &value, &analysis.shape, analysis)?;
    Ok(Some(
        text.filter(|text| !text.is_empty())
            .unwrap_or_else(|| default.to_string()),
    ))
}

/// Handler-based write path with bracketed-sequence support.
#[derive(Debug, Clone, Default)]
pub struct HandlerWriteConverter {
    codec: SpecSequenceCodec,
}

impl HandlerWriteConverter {
    /// Converter joining sequences with `codec`.
    pub fn new(codec: SpecSequenceCodec) -> Self {
        Self { codec }
    }
}

impl WriteConverter for HandlerWriteConverter {
    fn supports(&self, analysis: &Analysis) -> bool {
        analysis.uses_handler()
    }

    fn convert(
        &self,
        value: &Value,
        _scope: &Scope,
        analysis: &Analysis,
    ) -> Result<Option<String>> {
        let text = encode_shape(&self.codec, value, &analysis.shape, analysis)?;
        apply_write_default(&self.codec, text, analysis)
    }
}

/// Expression-based write path.
pub struct ExpressionWriteConverter {
    codec: SpecSequenceCodec,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ExpressionWriteConverter {
    /// Converter delegating to `evaluator`.
    pub fn new(codec: SpecSequenceCodec, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { codec, evaluator }
    }
}

impl WriteConverter for ExpressionWriteConverter {
    fn supports(&self, analysis: &Analysis) -> bool {
        analysis.uses_expression()
    }

    fn convert(
        &self,
        value: &Value,
        scope: &Scope,
        analysis: &Analysis,
    ) -> Result<Option<String>> {
        let Some(expression) = analysis.expression.as_deref() else {
            return Err(MappingError::Invariant(format!(
                "attribute `{}` is flagged for expressions but declares none",
                analysis.descriptor.name
            )));
        };
        let result = self
            .evaluator
            .evaluate(expression, scope)
            .map_err(|message| {
                MappingError::conversion(&analysis.descriptor, value.to_string(), message)
            })?;
        let text = match result {
            Value::Null => None,
            Value::Str(text) => Some(text),
            Value::Seq(_) => encode_shape(&self.codec, &result, &analysis.shape, analysis)?,
            other => Some(other.to_string()),
        };
        apply_write_default(&self.codec, text, analysis)
    }
}

/// Write-side router over the available converters.
pub struct WriteConverterRouter {
    l_converters: Vec<Box<dyn WriteConverter>>,
}

impl WriteConverterRouter {
    /// Router for `options`: handler converter first, then expression converter
    /// when an evaluator is configured.
    pub fn new(options: &SpecMappingOptions) -> Self {
        let mut l_converters: Vec<Box<dyn WriteConverter>> = vec![Box::new(
            HandlerWriteConverter::new(options.sequence_codec.clone()),
        )];
        if let Some(evaluator) = &options.expression_evaluator {
            l_converters.push(Box::new(ExpressionWriteConverter::new(
                options.sequence_codec.clone(),
                Arc::clone(evaluator),
            )));
        }
        Self { l_converters }
    }

    /// Dispatch to the first converter supporting `analysis`.
    pub fn convert(
        &self,
        value: &Value,
        scope: &Scope,
        analysis: &Analysis,
    ) -> Result<Option<String>> {
        let Some(converter) = self.l_converters.iter().find(|c| c.supports(analysis)) else {
            return Err(MappingError::Invariant(format!(
                "no write converter supports attribute `{}` ({:?})",
                analysis.descriptor.name, analysis.flags
            )));
        };
        converter.convert(value, scope, analysis)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
