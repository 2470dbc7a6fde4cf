use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::platform::error::PlatformError;

/// Platform-ready definition of one intent: its compiled training
/// utterances plus the slot declarations they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRegistration {
    pub name: String,
    pub utterances: Vec<String>,
    /// Slot name to platform type code.
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

/// One inbound webhook request, as surfaced by a platform adapter.
/// The engine reads the matched slots and session, and hands back the
/// composed speech and the end-session decision.
pub trait PlatformRequestPort: Send {
    fn user_id(&self) -> &str;
    fn slots(&self) -> BTreeMap<String, String>;
    fn slot(&self, name: &str) -> Option<String>;
    fn session_attributes(&self) -> BTreeMap<String, String>;
    fn set_session_attribute(&mut self, key: &str, value: &str);
    fn say(&mut self, ssml: &str);
    fn should_end_session(&mut self, end: bool);
}

/// Callback surface a platform invokes when a request arrives. The
/// conversation engine implements this; adapters hold it behind an Arc.
#[async_trait]
pub trait IntentHandlerPort: Send + Sync {
    async fn on_intent(
        &self,
        intent_name: &str,
        request: &mut dyn PlatformRequestPort,
    ) -> Result<(), PlatformError>;

    async fn on_launch(&self, request: &mut dyn PlatformRequestPort) -> Result<(), PlatformError>;

    /// Must always leave some spoken output on the request; platforms
    /// flag an empty response as an error.
    async fn on_error(&self, request: &mut dyn PlatformRequestPort, message: &str);
}

/// Registration surface of one voice platform.
pub trait PlatformAdapterPort: Send + Sync {
    fn reg_intent(
        &self,
        registration: IntentRegistration,
        handler: std::sync::Arc<dyn IntentHandlerPort>,
    ) -> Result<(), PlatformError>;

    fn reg_custom_slot(&self, type_name: &str, values: &[String]) -> Result<(), PlatformError>;

    fn on_launch(
        &self,
        handler: std::sync::Arc<dyn IntentHandlerPort>,
    ) -> Result<(), PlatformError>;

    fn on_error(&self, handler: std::sync::Arc<dyn IntentHandlerPort>)
    -> Result<(), PlatformError>;
}
