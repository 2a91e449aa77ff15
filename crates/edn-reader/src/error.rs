use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{Span, Symbol};

/// Wrapped cause of a failure that originated outside the reader.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    pub span: Option<Span>,
    pub file: Option<String>,
}

impl ErrorContext {
    fn set_span(&mut self, span: Span) {
        if self.span.is_none() {
            self.span = Some(span);
        }
    }

    fn set_file(&mut self, file: Option<String>) {
        if self.file.is_none() {
            self.file = file;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReadErrorData {
    pub message: String,
    pub context: ErrorContext,
}

impl ReadErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

impl fmt::Display for ReadErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum EdnError {
    #[error("{0}")]
    Lexical(ReadErrorData),

    #[error("{0}")]
    Eof(ReadErrorData),

    #[error("Unmatched delimiter: {delimiter}")]
    UnmatchedDelimiter {
        delimiter: char,
        context: ErrorContext,
    },

    #[error("No dispatch macro for: #{dispatch}")]
    NoDispatch {
        dispatch: char,
        context: ErrorContext,
    },

    #[error("No reader function for tag {tag}")]
    NoTagReader { tag: Symbol, context: ErrorContext },

    #[error("Reader function for tag {tag} failed: {message}")]
    TagReader {
        tag: Symbol,
        message: String,
        #[source]
        cause: Option<Cause>,
        context: ErrorContext,
    },

    #[error("{message}")]
    Source {
        message: String,
        #[source]
        cause: Option<Cause>,
        context: ErrorContext,
    },
}

impl EdnError {
    pub fn lexical(message: impl Into<String>) -> Self {
        EdnError::Lexical(ReadErrorData::new(message))
    }

    pub fn eof(message: impl Into<String>) -> Self {
        EdnError::Eof(ReadErrorData::new(message))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.context_mut().set_span(span);
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.context_mut().set_file(file);
        self
    }

    pub fn span(&self) -> Option<Span> {
        self.context_ref().span
    }

    pub fn file(&self) -> Option<&str> {
        self.context_ref().file.as_deref()
    }

    fn context_ref(&self) -> &ErrorContext {
        match self {
            EdnError::Lexical(data) | EdnError::Eof(data) => &data.context,
            EdnError::UnmatchedDelimiter { context, .. }
            | EdnError::NoDispatch { context, .. }
            | EdnError::NoTagReader { context, .. }
            | EdnError::TagReader { context, .. }
            | EdnError::Source { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            EdnError::Lexical(data) | EdnError::Eof(data) => &mut data.context,
            EdnError::UnmatchedDelimiter { context, .. }
            | EdnError::NoDispatch { context, .. }
            | EdnError::NoTagReader { context, .. }
            | EdnError::TagReader { context, .. }
            | EdnError::Source { context, .. } => context,
        }
    }
}

impl From<std::io::Error> for EdnError {
    fn from(err: std::io::Error) -> Self {
        EdnError::Source {
            message: err.to_string(),
            cause: Some(Arc::new(err)),
            context: ErrorContext::default(),
        }
    }
}

/// Renders an error with its position, `file:line:col message`.
pub fn format_error(err: &EdnError) -> String {
    match (err.file(), err.span()) {
        (Some(file), Some(span)) => format!("{}:{}:{} {}", file, span.line, span.col, err),
        (None, Some(span)) => format!("{}:{} {}", span.line, span.col, err),
        _ => err.to_string(),
    }
}
