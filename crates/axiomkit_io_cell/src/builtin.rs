//! Built-in scalar handlers.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::conf::{C_FMT_DATE_DEFAULT, C_FMT_DATETIME_DEFAULT, C_FMT_TIME_DEFAULT};
use crate::handler::{SpecAttributeContext, TypeHandler, TypeHandlerRegistryBuilder};
use crate::spec::TypeKey;
use crate::value::Value;

type HandlerResult<T> = std::result::Result<T, String>;

fn derive_unsupported_text(value: &Value, key: &TypeKey) -> String {
    format!("cannot encode {} value as {key}", value.kind_name())
}

////////////////////////////////////////////////////////////////////////////////
// #region Numbers

/// Signed integer handler for one fixed width.
#[derive(Debug, Clone)]
pub struct SignedIntegerHandler {
    key: TypeKey,
    n_min: i64,
    n_max: i64,
}

impl SignedIntegerHandler {
    /// Handler for `key`; `None` if `key` is not a signed integer type.
    pub fn new(key: TypeKey) -> Option<Self> {
        let (n_min, n_max) = match key {
            TypeKey::I8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
            TypeKey::I16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
            TypeKey::I32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
            TypeKey::I64 => (i64::MIN, i64::MAX),
            _ => return None,
        };
        Some(Self { key, n_min, n_max })
    }

    fn check_range(&self, n: i64) -> HandlerResult<i64> {
        if n < self.n_min || n > self.n_max {
            return Err(format!("{n} is out of range for {}", self.key));
        }
        Ok(n)
    }
}

impl TypeHandler for SignedIntegerHandler {
    fn handled_type(&self) -> TypeKey {
        self.key.clone()
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Int(n) => Ok(n.to_string()),
            Value::UInt(n) => Ok(n.to_string()),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => Ok((*n as i64).to_string()),
            other => Err(derive_unsupported_text(other, &self.key)),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_text = text.trim();
        if let Ok(n) = c_text.parse::<i64>() {
            return self.check_range(n).map(Value::Int);
        }
        // Spreadsheet engines often render whole numbers as `12.0`.
        match c_text.parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 => {
                self.check_range(n as i64).map(Value::Int)
            }
            _ => Err(format!("{c_text:?} is not a valid {}", self.key)),
        }
    }
}

/// Unsigned integer handler for one fixed width.
#[derive(Debug, Clone)]
pub struct UnsignedIntegerHandler {
    key: TypeKey,
    n_max: u64,
}

impl UnsignedIntegerHandler {
    /// Handler for `key`; `None` if `key` is not an unsigned integer type.
    pub fn new(key: TypeKey) -> Option<Self> {
        let n_max = match key {
            TypeKey::U8 => u64::from(u8::MAX),
            TypeKey::U16 => u64::from(u16::MAX),
            TypeKey::U32 => u64::from(u32::MAX),
            TypeKey::U64 => u64::MAX,
            _ => return None,
        };
        Some(Self { key, n_max })
    }
}

impl TypeHandler for UnsignedIntegerHandler {
    fn handled_type(&self) -> TypeKey {
        self.key.clone()
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::UInt(n) => Ok(n.to_string()),
            Value::Int(n) if *n >= 0 => Ok(n.to_string()),
            other => Err(derive_unsupported_text(other, &self.key)),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_text = text.trim();
        let n = match c_text.parse::<u64>() {
            Ok(n) => n,
            Err(_) => match c_text.parse::<f64>() {
                Ok(n) if n.is_finite() && n.fract() == 0.0 && (0.0..9.0e15).contains(&n) => {
                    n as u64
                }
                _ => return Err(format!("{c_text:?} is not a valid {}", self.key)),
            },
        };
        if n > self.n_max {
            return Err(format!("{n} is out of range for {}", self.key));
        }
        Ok(Value::UInt(n))
    }
}

/// Floating point handler (`f32` or `f64`).
#[derive(Debug, Clone)]
pub struct FloatHandler {
    key: TypeKey,
}

impl FloatHandler {
    /// Handler for `key`; `None` if `key` is not a float type.
    pub fn new(key: TypeKey) -> Option<Self> {
        matches!(key, TypeKey::F32 | TypeKey::F64).then_some(Self { key })
    }
}

impl TypeHandler for FloatHandler {
    fn handled_type(&self) -> TypeKey {
        self.key.clone()
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        let n = match value {
            Value::Float(n) => *n,
            Value::Int(n) => *n as f64,
            Value::UInt(n) => *n as f64,
            other => return Err(derive_unsupported_text(other, &self.key)),
        };
        Ok(match self.key {
            TypeKey::F32 => (n as f32).to_string(),
            _ => n.to_string(),
        })
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_text = text.trim();
        let n = match self.key {
            TypeKey::F32 => c_text.parse::<f32>().map(f64::from),
            _ => c_text.parse::<f64>(),
        };
        n.map(Value::Float)
            .map_err(|_| format!("{c_text:?} is not a valid {}", self.key))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextAndFlags

/// `bool` handler accepting `true`/`false` in any case.
#[derive(Debug, Clone, Default)]
pub struct BoolHandler;

impl TypeHandler for BoolHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Bool
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Bool(val) => Ok(val.to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::Bool)),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_text = text.trim();
        if c_text.eq_ignore_ascii_case("true") {
            Ok(Value::Bool(true))
        } else if c_text.eq_ignore_ascii_case("false") {
            Ok(Value::Bool(false))
        } else {
            Err(format!("{c_text:?} is not a valid bool"))
        }
    }
}

/// `char` handler; cell text must hold exactly one character.
#[derive(Debug, Clone, Default)]
pub struct CharHandler;

impl TypeHandler for CharHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Char
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Char(chr) => Ok(chr.to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::Char)),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(chr), None) => Ok(Value::Char(chr)),
            _ => Err(format!("{text:?} is not a single character")),
        }
    }
}

/// `String` handler; text passes through untouched.
#[derive(Debug, Clone, Default)]
pub struct StringHandler;

impl TypeHandler for StringHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::String
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Str(val) | Value::Enum(val) => Ok(val.clone()),
            Value::Seq(_) => Err(derive_unsupported_text(value, &TypeKey::String)),
            other => Ok(other.to_string()),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        Ok(Value::Str(text.to_string()))
    }
}

/// `uuid::Uuid` handler using the hyphenated form.
#[derive(Debug, Clone, Default)]
pub struct UuidHandler;

impl TypeHandler for UuidHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Uuid
    }

    fn encode(&self, value: &Value, _ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Uuid(val) => Ok(val.hyphenated().to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::Uuid)),
        }
    }

    fn decode(&self, text: &str, _ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .map_err(|err| err.to_string())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateTime

/// Calendar date handler; honours the attribute's format pattern.
#[derive(Debug, Clone, Default)]
pub struct DateHandler;

impl TypeHandler for DateHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Date
    }

    fn encode(&self, value: &Value, ctx: &SpecAttributeContext) -> HandlerResult<String> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_DATE_DEFAULT);
        match value {
            Value::Date(val) => Ok(val.format(c_fmt).to_string()),
            Value::DateTime(val) => Ok(val.date().format(c_fmt).to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::Date)),
        }
    }

    fn decode(&self, text: &str, ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_DATE_DEFAULT);
        NaiveDate::parse_from_str(text.trim(), c_fmt)
            .map(Value::Date)
            .map_err(|err| format!("{err} (pattern {c_fmt:?})"))
    }
}

/// Wall-clock time handler; honours the attribute's format pattern.
#[derive(Debug, Clone, Default)]
pub struct TimeHandler;

impl TypeHandler for TimeHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Time
    }

    fn encode(&self, value: &Value, ctx: &SpecAttributeContext) -> HandlerResult<String> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_TIME_DEFAULT);
        match value {
            Value::Time(val) => Ok(val.format(c_fmt).to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::Time)),
        }
    }

    fn decode(&self, text: &str, ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_TIME_DEFAULT);
        NaiveTime::parse_from_str(text.trim(), c_fmt)
            .map(Value::Time)
            .map_err(|err| format!("{err} (pattern {c_fmt:?})"))
    }
}

/// Date-time handler; honours the attribute's format pattern.
#[derive(Debug, Clone, Default)]
pub struct DateTimeHandler;

impl TypeHandler for DateTimeHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::DateTime
    }

    fn encode(&self, value: &Value, ctx: &SpecAttributeContext) -> HandlerResult<String> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_DATETIME_DEFAULT);
        match value {
            Value::DateTime(val) => Ok(val.format(c_fmt).to_string()),
            other => Err(derive_unsupported_text(other, &TypeKey::DateTime)),
        }
    }

    fn decode(&self, text: &str, ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let c_fmt = ctx.format.as_deref().unwrap_or(C_FMT_DATETIME_DEFAULT);
        NaiveDateTime::parse_from_str(text.trim(), c_fmt)
            .map(Value::DateTime)
            .map_err(|err| format!("{err} (pattern {c_fmt:?})"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Enum

/// Generic handler for every enum type without a dedicated registration.
///
/// Literals are reified against the constants of the enum declared on the
/// attribute. A literal matching no constant decodes to [`Value::Null`].
#[derive(Debug, Clone, Default)]
pub struct EnumHandler;

impl TypeHandler for EnumHandler {
    fn handled_type(&self) -> TypeKey {
        TypeKey::Named("Enum".to_string())
    }

    fn encode(&self, value: &Value, ctx: &SpecAttributeContext) -> HandlerResult<String> {
        match value {
            Value::Enum(val) | Value::Str(val) => Ok(val.clone()),
            other => Err(derive_unsupported_text(other, &ctx.element_key)),
        }
    }

    fn decode(&self, text: &str, ctx: &SpecAttributeContext) -> HandlerResult<Value> {
        let TypeKey::Enum(spec_enum) = &ctx.element_key else {
            return Err(format!("{} is not an enum type", ctx.element_key));
        };
        let c_text = text.trim();
        match spec_enum.find_constant(c_text) {
            Some(c_constant) => Ok(Value::Enum(c_constant.to_string())),
            None => {
                tracing::warn!(
                    attribute = %ctx.attribute.name,
                    enum_type = %spec_enum.name,
                    literal = c_text,
                    "unknown enum literal decoded as absent value"
                );
                Ok(Value::Null)
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

/// Register every built-in handler into `builder`.
pub fn register_builtin_handlers(builder: &mut TypeHandlerRegistryBuilder) {
    let mut l_handlers: Vec<Arc<dyn TypeHandler>> = vec![
        Arc::new(BoolHandler),
        Arc::new(CharHandler),
        Arc::new(StringHandler),
        Arc::new(UuidHandler),
        Arc::new(DateHandler),
        Arc::new(TimeHandler),
        Arc::new(DateTimeHandler),
    ];
    for key in [TypeKey::I8, TypeKey::I16, TypeKey::I32, TypeKey::I64] {
        if let Some(handler) = SignedIntegerHandler::new(key) {
            l_handlers.push(Arc::new(handler));
        }
    }
    for key in [TypeKey::U8, TypeKey::U16, TypeKey::U32, TypeKey::U64] {
        if let Some(handler) = UnsignedIntegerHandler::new(key) {
            l_handlers.push(Arc::new(handler));
        }
    }
    for key in [TypeKey::F32, TypeKey::F64] {
        if let Some(handler) = FloatHandler::new(key) {
            l_handlers.push(Arc::new(handler));
        }
    }

    for handler in l_handlers {
        builder.insert_builtin(handler);
    }
}
