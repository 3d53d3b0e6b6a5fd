use thiserror::Error;

/// Errors raised while compiling a pattern into an operator tree.
///
/// Matching itself never fails with an error; a subject that does not match
/// is reported as `None` by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected input at offset {offset}: {remaining:?}")]
    UnexpectedInput { offset: usize, remaining: String },
    #[error("parse error: {0}")]
    Syntax(String),
    #[error("quantifier bounds {{{min},{max}}} are out of order")]
    InvalidQuantifierBounds { min: usize, max: usize },
    #[error("lookbehind `{0}` does not match a fixed number of characters")]
    UnresolvableLookbehind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
