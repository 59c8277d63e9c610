//! Cell conversion constants and default preset factories.

use crate::codec::SpecSequenceCodec;
use crate::spec::SpecMappingOptions;

/// Default opening bracket of a serialized sequence.
pub const C_SEQ_OPENER_DEFAULT: char = '[';
/// Default closing bracket of a serialized sequence.
pub const C_SEQ_CLOSER_DEFAULT: char = ']';
/// Default delimiter between serialized sequence tokens.
pub const C_SEQ_DELIMITER_DEFAULT: &str = ", ";

/// Date pattern used when an attribute declares no format.
pub const C_FMT_DATE_DEFAULT: &str = "%Y-%m-%d";
/// Time pattern used when an attribute declares no format.
pub const C_FMT_TIME_DEFAULT: &str = "%H:%M:%S";
/// Date-time pattern used when an attribute declares no format.
pub const C_FMT_DATETIME_DEFAULT: &str = "%Y-%m-%d %H:%M:%S";

/// Upper bound of unwrap steps while classifying one declared type.
///
/// Well-formed declarations terminate far below this; hitting it means a
/// cyclic or malformed bound.
pub const N_RESOLVE_STEPS_MAX: usize = 64;

/// Name used for unbounded type variables and wildcards.
pub const C_TYPE_NAME_TOP: &str = "Object";

/// Build default sequence codec (`[a, b, c]`).
pub fn derive_default_sequence_codec() -> SpecSequenceCodec {
    SpecSequenceCodec::default()
}

/// Build default mapping options.
pub fn derive_default_mapping_options() -> SpecMappingOptions {
    SpecMappingOptions::default()
}
