use thiserror::Error;

use crate::types::{GGUFMagic, GGUFValueType};

#[derive(Error, Debug)]
pub enum GGUFError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid GGUF magic: 0x{0:08X}")]
    InvalidMagic(u32),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(GGUFMagic),

    #[error("Invalid value type tag: {0}")]
    InvalidValueType(u32),

    #[error("Invalid tensor type tag: {0}")]
    InvalidTensorType(u32),

    #[error("Type mismatch: expected {expected:?}, found {actual:?}")]
    TypeMismatch {
        expected: GGUFValueType,
        actual: GGUFValueType,
    },

    #[error("Value of type {0:?} is not numeric")]
    NotNumeric(GGUFValueType),

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<GGUFError>,
    },
}

impl GGUFError {
    /// Innermost error beneath any `Context` wrappers.
    pub fn root_cause(&self) -> &GGUFError {
        let mut err = self;
        while let GGUFError::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// `true` when the root cause is an unexpected end of input.
    pub fn is_eof(&self) -> bool {
        matches!(
            self.root_cause(),
            GGUFError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}

pub type Result<T> = std::result::Result<T, GGUFError>;

/// Wraps errors with the name of the step that produced them.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<GGUFError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| GGUFError::Context {
            context: context.to_string(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| GGUFError::Context {
            context: f(),
            source: Box::new(e.into()),
        })
    }
}
