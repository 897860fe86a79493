//! Filter compilation errors.
//!
//! Each stage of the compiler fails with its own variant so callers can tell
//! a malformed expression apart from a hostile one.

use std::fmt;

use thiserror::Error;

/// Byte range of a token or node in the source expression, with the
/// 1-based column of its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, column: usize) -> Self {
        Self { start, end, column }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            column: if self.start <= other.start {
                self.column
            } else {
                other.column
            },
        }
    }

    /// Source text covered by this span, truncated for error messages.
    pub fn fragment(&self, source: &str) -> String {
        const MAX_FRAGMENT: usize = 60;
        let text = source.get(self.start..self.end).unwrap_or_default().trim();
        if text.chars().count() > MAX_FRAGMENT {
            let cut: String = text.chars().take(MAX_FRAGMENT).collect();
            format!("{cut}...")
        } else {
            text.to_string()
        }
    }
}

/// A syntax error with location information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            found: None,
        }
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn unexpected_eof(span: Span, expected: &str) -> Self {
        Self {
            message: format!("unexpected end of expression, expected {expected}"),
            span,
            found: Some("end of expression".to_string()),
        }
    }

    pub fn unexpected_token(span: Span, expected: &str, found: &str) -> Self {
        Self {
            message: format!("expected {expected}, found {found}"),
            span,
            found: Some(found.to_string()),
        }
    }

    pub fn column(&self) -> usize {
        self.span.column
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax error at column {}: {}", self.span.column, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Why a filter expression was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The text is not a well-formed expression.
    #[error("Invalid filter expression: {0}")]
    Parse(#[from] ParseError),

    /// The expression uses a construct outside the whitelist.
    #[error("Unsafe filter expression: {construct} is not allowed (in '{fragment}')")]
    Security { construct: String, fragment: String },

    /// The expression names something the entity type does not declare.
    #[error(
        "Unknown field '{name}' for {entity_type}. Available fields: {}",
        .available.join(", ")
    )]
    Name {
        name: String,
        entity_type: String,
        available: Vec<String>,
    },

    /// Operands of a comparison, method or logical operator do not fit.
    #[error("Invalid filter expression: {0}")]
    Type(String),
}

impl FilterError {
    pub fn security(construct: impl Into<String>, span: Span, source: &str) -> Self {
        FilterError::Security {
            construct: construct.into(),
            fragment: span.fragment(source),
        }
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterError::Parse(_) => "parse",
            FilterError::Security { .. } => "security",
            FilterError::Name { .. } => "name",
            FilterError::Type(_) => "type",
        }
    }
}
