//! Bracketed sequence codec: `[a, [b, c], d]` <-> ordered string tokens.
//!
//! Nested sequences are kept intact as single tokens; callers descend one
//! level at a time. There is no escaping, so scalar tokens must not contain
//! the bracket characters or the delimiter.

use crate::conf::{C_SEQ_CLOSER_DEFAULT, C_SEQ_DELIMITER_DEFAULT, C_SEQ_OPENER_DEFAULT};
use crate::spec::{MappingError, Result};

/// Bracket and delimiter settings of the sequence encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSequenceCodec {
    /// Opening bracket.
    pub opener: char,
    /// Closing bracket.
    pub closer: char,
    /// Token delimiter.
    pub delimiter: String,
}

impl Default for SpecSequenceCodec {
    fn default() -> Self {
        Self {
            opener: C_SEQ_OPENER_DEFAULT,
            closer: C_SEQ_CLOSER_DEFAULT,
            delimiter: C_SEQ_DELIMITER_DEFAULT.to_string(),
        }
    }
}

impl SpecSequenceCodec {
    /// Create a validated codec.
    pub fn new(opener: char, closer: char, delimiter: impl Into<String>) -> Result<Self> {
        let spec_codec = Self {
            opener,
            closer,
            delimiter: delimiter.into(),
        };
        spec_codec.validate()?;
        Ok(spec_codec)
    }

    /// Check bracket/delimiter settings for ambiguity.
    pub fn validate(&self) -> Result<()> {
        if self.opener == self.closer {
            return Err(MappingError::configuration(format!(
                "Sequence opener and closer must differ, got {:?} twice.",
                self.opener
            )));
        }
        if self.delimiter.is_empty() {
            return Err(MappingError::configuration(
                "Sequence delimiter must not be empty.",
            ));
        }
        if self.delimiter.contains(self.opener) || self.delimiter.contains(self.closer) {
            return Err(MappingError::configuration(format!(
                "Sequence delimiter {:?} must not contain {:?} or {:?}.",
                self.delimiter, self.opener, self.closer
            )));
        }
        Ok(())
    }

    /// Join `tokens` into canonical form; an empty slice yields `opener+closer`.
    pub fn serialize<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        let mut c_out = String::new();
        c_out.push(self.opener);
        for (n_idx, token) in tokens.iter().enumerate() {
            if n_idx > 0 {
                c_out.push_str(&self.delimiter);
            }
            c_out.push_str(token.as_ref());
        }
        c_out.push(self.closer);
        c_out
    }

    /// Whether `text` is wrapped in this codec's brackets.
    pub fn is_bracketed(&self, text: &str) -> bool {
        text.len() >= self.opener.len_utf8() + self.closer.len_utf8()
            && text.starts_with(self.opener)
            && text.ends_with(self.closer)
    }

    /// Split the top level of `text` into tokens.
    ///
    /// Nested bracketed tokens are returned verbatim. A trailing
    /// `delimiter + closer` yields one final empty token.
    pub fn shallow_split(&self, text: &str) -> Result<Vec<String>> {
        let mut l_tokens = Vec::new();
        self.scan_top_level(text, |token| l_tokens.push(token.to_string()))?;
        Ok(l_tokens)
    }

    /// Count top-level tokens without materializing them.
    ///
    /// Always equals `shallow_split(text)?.len()`.
    pub fn shallow_length(&self, text: &str) -> Result<usize> {
        let mut n_tokens = 0usize;
        self.scan_top_level(text, |_| n_tokens += 1)?;
        Ok(n_tokens)
    }

    /// Byte index of the closer matching the opener at `idx_open`.
    pub fn find_matching_closer(&self, text: &str, idx_open: usize) -> Option<usize> {
        let mut n_depth = 0usize;
        for (n_idx, chr) in text[idx_open..].char_indices() {
            if chr == self.opener {
                n_depth += 1;
            } else if chr == self.closer {
                if n_depth == 0 {
                    return None;
                }
                n_depth -= 1;
                if n_depth == 0 {
                    return Some(idx_open + n_idx);
                }
            }
        }
        None
    }

    fn scan_top_level<'a, F>(&self, text: &'a str, mut on_token: F) -> Result<()>
    where
        F: FnMut(&'a str),
    {
        if !self.is_bracketed(text) {
            return Err(self.derive_parse_error(
                text,
                format!(
                    "sequence must start with {:?} and end with {:?}",
                    self.opener, self.closer
                ),
            ));
        }

        let n_idx_body_start = self.opener.len_utf8();
        let n_idx_body_end = text.len() - self.closer.len_utf8();
        let body = &text[n_idx_body_start..n_idx_body_end];
        if body.is_empty() {
            return Ok(());
        }

        let mut n_idx_token_start = 0usize;
        let mut n_idx = 0usize;
        while n_idx < body.len() {
            if body[n_idx..].starts_with(&self.delimiter) {
                on_token(&body[n_idx_token_start..n_idx]);
                n_idx += self.delimiter.len();
                n_idx_token_start = n_idx;
                continue;
            }

            let Some(chr) = body[n_idx..].chars().next() else {
                break;
            };
            if chr == self.opener {
                let Some(n_idx_close) = self.find_matching_closer(body, n_idx) else {
                    return Err(self.derive_parse_error(
                        text,
                        format!("unclosed {:?} at byte {}", self.opener, n_idx_body_start + n_idx),
                    ));
                };
                n_idx = n_idx_close + self.closer.len_utf8();
                continue;
            }
            if chr == self.closer {
                return Err(self.derive_parse_error(
                    text,
                    format!("unbalanced {:?} at byte {}", self.closer, n_idx_body_start + n_idx),
                ));
            }
            n_idx += chr.len_utf8();
        }

        on_token(&body[n_idx_token_start..]);
        Ok(())
    }

    fn derive_parse_error(&self, text: &str, message: String) -> MappingError {
        MappingError::Parse {
            input: text.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn shallow_split_handles_empty_flat_and_nested_sequences() {
        let codec = SpecSequenceCodec::default();
        assert_eq!(codec.shallow_split("[]").unwrap(), Vec::<String>::new());
        assert_eq!(codec.shallow_split("[a, b, c]").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            codec.shallow_split("[[1, 2], [3, 4]]").unwrap(),
            vec!["[1, 2]", "[3, 4]"]
        );
        assert_eq!(
            codec.shallow_split("[[[1], [2, 3]], []]").unwrap(),
            vec!["[[1], [2, 3]]", "[]"]
        );
    }

    #[test]
    fn shallow_split_keeps_absent_elements_as_empty_tokens() {
        let codec = SpecSequenceCodec::default();
        assert_eq!(codec.shallow_split("[a, ]").unwrap(), vec!["a", ""]);
        assert_eq!(codec.shallow_split("[, a]").unwrap(), vec!["", "a"]);
        assert_eq!(codec.shallow_split("[a, , b]").unwrap(), vec!["a", "", "b"]);
        assert_eq!(codec.shallow_split("[[1], ]").unwrap(), vec!["[1]", ""]);
    }

    #[test]
    fn shallow_split_rejects_unbalanced_input() {
        let codec = SpecSequenceCodec::default();
        for c_bad in ["a, b", "[a, b", "[a, [b]", "[a]]", "[[a, b]", ""] {
            let err = codec.shallow_split(c_bad).unwrap_err();
            assert!(matches!(err, MappingError::Parse { .. }), "{c_bad:?}");
        }
    }

    #[test]
    fn serialize_produces_canonical_form() {
        let codec = SpecSequenceCodec::default();
        assert_eq!(codec.serialize::<&str>(&[]), "[]");
        assert_eq!(codec.serialize(&["1", "2"]), "[1, 2]");
        assert_eq!(codec.serialize(&["[1, 2]", "[3]"]), "[[1, 2], [3]]");
    }

    #[test]
    fn custom_brackets_and_delimiter_are_honoured() {
        let codec = SpecSequenceCodec::new('{', '}', ";").unwrap();
        assert_eq!(codec.serialize(&["x", "{y;z}"]), "{x;{y;z}}");
        assert_eq!(codec.shallow_split("{x;{y;z}}").unwrap(), vec!["x", "{y;z}"]);
        assert_eq!(codec.shallow_length("{x;{y;z}}").unwrap(), 2);
    }

    #[test]
    fn ambiguous_settings_are_configuration_errors() {
        assert!(SpecSequenceCodec::new('|', '|', ",").is_err());
        assert!(SpecSequenceCodec::new('[', ']', "").is_err());
        assert!(SpecSequenceCodec::new('[', ']', "],").is_err());
    }

    fn nested_sequence() -> impl Strategy<Value = String> {
        "[a-z0-9]{0,4}".prop_recursive(3, 24, 5, |inner| {
            prop::collection::vec(inner, 0..5)
                .prop_map(|l_tokens| SpecSequenceCodec::default().serialize(&l_tokens))
        })
    }

    proptest! {
        #[test]
        fn shallow_length_agrees_with_shallow_split(
            l_tokens in prop::collection::vec(nested_sequence(), 0..6)
        ) {
            let codec = SpecSequenceCodec::default();
            let c_text = codec.serialize(&l_tokens);
            let l_split = codec.shallow_split(&c_text).unwrap();
            prop_assert_eq!(codec.shallow_length(&c_text).unwrap(), l_split.len());
        }

        #[test]
        fn split_recovers_serialized_tokens(
            l_tokens in prop::collection::vec("[a-z0-9]{1,6}", 0..8)
        ) {
            let codec = SpecSequenceCodec::default();
            let c_text = codec.serialize(&l_tokens);
            prop_assert_eq!(codec.shallow_split(&c_text).unwrap(), l_tokens);
        }
    }
}
