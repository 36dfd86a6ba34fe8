//! Limits and policies applied while decoding untrusted input.

/// What to do with fields whose numbers the schema does not describe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownFields {
    /// Skip the payload and keep it on the message so that re-encoding reproduces it.
    #[default]
    Preserve,
    /// Skip the payload and forget it.
    Discard,
    /// Fail the decode with [crate::Error::UnknownField].
    Reject,
}

/// Configuration for [crate::decode].
///
/// # Examples
///
/// ```
/// use wireform_codec::{Config, UnknownFields};
///
/// // Closed system: no unknown fields, shallow messages, small inputs.
/// let cfg = Config {
///     max_depth: 16,
///     max_len: 64 * 1024,
///     unknown_fields: UnknownFields::Reject,
/// };
/// assert_eq!(Config::default().max_depth, 100);
/// # let _ = cfg;
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum nesting of embedded messages below the outermost one.
    pub max_depth: usize,

    /// Maximum length of an encoded message, in bytes.
    pub max_len: usize,

    /// Handling of fields unknown to the schema.
    pub unknown_fields: UnknownFields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_len: usize::MAX,
            unknown_fields: UnknownFields::Preserve,
        }
    }
}

impl Config {
    /// The default configuration with unknown fields rejected.
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFields::Reject,
            ..Self::default()
        }
    }
}
