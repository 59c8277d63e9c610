//! `axiomkit_io_cell` v1:
//! Value conversion and attribute analysis between records and cell text.
//!
//! Architecture:
//! - `conf`      : constants and default presets
//! - `spec`      : type model, options and errors
//! - `value`     : dynamic value model and field bridges
//! - `codec`     : bracketed sequence codec
//! - `container` : container type resolver and shape trees
//! - `handler`   : type handler trait and registries
//! - `builtin`   : built-in scalar handlers
//! - `schema`    : explicit record schemas, creators and validators
//! - `analyzer`  : per-attribute conversion plans
//! - `converter` : read/write converters and routers
//! - `creator`   : model creator resolver
//! - `tabular`   : tabular engine interfaces
//! - `mapper`    : record reader/writer sessions
pub mod analyzer;
pub mod builtin;
pub mod codec;
pub mod conf;
pub mod container;
pub mod converter;
pub mod creator;
pub mod handler;
pub mod mapper;
pub mod schema;
pub mod spec;
pub mod tabular;
pub mod value;

pub use analyzer::{Analysis, AnalysisFlags, AttributeAnalyzer, AttributeBinding};
pub use builtin::{
    BoolHandler, CharHandler, DateHandler, DateTimeHandler, EnumHandler, FloatHandler,
    SignedIntegerHandler, StringHandler, TimeHandler, UnsignedIntegerHandler, UuidHandler,
};
pub use codec::SpecSequenceCodec;
pub use conf::{
    C_FMT_DATE_DEFAULT, C_FMT_DATETIME_DEFAULT, C_FMT_TIME_DEFAULT, C_SEQ_CLOSER_DEFAULT,
    C_SEQ_DELIMITER_DEFAULT, C_SEQ_OPENER_DEFAULT, derive_default_mapping_options,
    derive_default_sequence_codec,
};
pub use container::{ShapeNode, build_shape, classify, resolve_concrete_type};
pub use converter::{
    ExpressionEvaluator, ExpressionReadConverter, ExpressionWriteConverter, HandlerReadConverter,
    HandlerWriteConverter, ReadConverter, ReadConverterRouter, WriteConverter,
    WriteConverterRouter,
};
pub use creator::{EnumParamBinding, ResolvedCreator, SpecParamBinding, resolve_creator};
pub use handler::{
    SpecAttributeContext, TypeHandler, TypeHandlerRegistry, TypeHandlerRegistryBuilder,
};
pub use mapper::{RecordReader, RecordWriter, SpecWriteReport};
pub use schema::{
    CellValidator, CreatorArgs, EnumCreatorKind, LengthValidator, OneOfValidator,
    RecordSchema, RecordSchemaBuilder, RegexValidator, SpecAttribute, SpecAttributeConfig,
    SpecCreator, SpecCreatorParam,
};
pub use spec::{
    AttributeDescriptor, EnumAccessMode, EnumContainerKind, EnumDefaultValueSource,
    EnumDirection, MappingError, RawType, Result, RuntimeDefaultStrategy,
    SpecContainerClassification, SpecDefaultValueMeta, SpecEnumType, SpecMappingOptions,
    SpecResolvedParameter, TypeDecl, TypeKey,
};
pub use tabular::{MemoryRowSink, RowSink, SpecCell, SpecRowScope, validate_unique_headers};
pub use value::{FromValue, IntoValue, Scope, Value};
