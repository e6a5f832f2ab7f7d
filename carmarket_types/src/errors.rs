//! Error types for the data contract crate.

/// Errors raised while parsing query options supplied as text.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// A sort key, direction, or other enumerated option was not recognized.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
