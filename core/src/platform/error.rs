use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    Registration,
    Dispatch,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PlatformError {}

pub fn registration_invalid(message: impl Into<String>) -> PlatformError {
    PlatformError::new(PlatformErrorKind::Registration, message)
}

pub fn dispatch_failed(message: impl Into<String>) -> PlatformError {
    PlatformError::new(PlatformErrorKind::Dispatch, message)
}

pub fn internal_error(message: impl Into<String>) -> PlatformError {
    PlatformError::new(PlatformErrorKind::Internal, message)
}
