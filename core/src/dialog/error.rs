use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogErrorKind {
    /// Author bug surfaced while compiling the intent tables; fatal.
    Registration,
    /// A request could not be routed to any author callback.
    Dispatch,
    /// An author resolver rejected or panicked.
    Resolver,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogError {
    pub kind: DialogErrorKind,
    pub message: String,
}

impl DialogError {
    pub fn new(kind: DialogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for DialogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DialogError {}

pub fn registration_invalid(message: impl Into<String>) -> DialogError {
    DialogError::new(DialogErrorKind::Registration, message)
}

pub fn dispatch_failed(message: impl Into<String>) -> DialogError {
    DialogError::new(DialogErrorKind::Dispatch, message)
}

pub fn resolver_failure(message: impl Into<String>) -> DialogError {
    DialogError::new(DialogErrorKind::Resolver, message)
}

pub fn internal_error(message: impl Into<String>) -> DialogError {
    DialogError::new(DialogErrorKind::Internal, message)
}
