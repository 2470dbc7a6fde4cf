pub mod error;
pub mod inline;
pub mod ports;
pub mod registry;

pub use error::{PlatformError, PlatformErrorKind};
pub use inline::{InlinePlatform, InlineRequest};
pub use ports::{IntentHandlerPort, IntentRegistration, PlatformAdapterPort, PlatformRequestPort};
pub use registry::PlatformRegistry;
