use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::platform::{
    error::{PlatformError, dispatch_failed, registration_invalid},
    ports::{IntentHandlerPort, IntentRegistration, PlatformAdapterPort, PlatformRequestPort},
};

/// In-process platform adapter. Holds the registrations an engine
/// compiles and replays requests straight into the registered handler;
/// used by the console driver and the test suites.
#[derive(Default)]
pub struct InlinePlatform {
    state: Mutex<InlineState>,
}

#[derive(Default)]
struct InlineState {
    intents: BTreeMap<String, RegisteredIntent>,
    custom_slots: BTreeMap<String, Vec<String>>,
    launch: Option<Arc<dyn IntentHandlerPort>>,
    error: Option<Arc<dyn IntentHandlerPort>>,
}

struct RegisteredIntent {
    registration: IntentRegistration,
    handler: Arc<dyn IntentHandlerPort>,
}

impl InlinePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .intents
            .keys()
            .cloned()
            .collect()
    }

    pub fn registration(&self, intent_name: &str) -> Option<IntentRegistration> {
        self.state
            .lock()
            .expect("lock poisoned")
            .intents
            .get(intent_name)
            .map(|entry| entry.registration.clone())
    }

    pub fn custom_slot_values(&self, type_name: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .expect("lock poisoned")
            .custom_slots
            .get(type_name)
            .cloned()
    }

    /// Replays one matched intent into the engine, falling back to the
    /// registered error hook when the handler fails.
    pub async fn dispatch_intent(
        &self,
        intent_name: &str,
        request: &mut dyn PlatformRequestPort,
    ) -> Result<(), PlatformError> {
        let (handler, error_hook) = {
            let state = self.state.lock().expect("lock poisoned");
            let handler = state
                .intents
                .get(intent_name)
                .map(|entry| Arc::clone(&entry.handler));
            (handler, state.error.clone())
        };
        let Some(handler) = handler else {
            return Err(dispatch_failed(format!(
                "no intent registered under '{intent_name}'"
            )));
        };

        match handler.on_intent(intent_name, request).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    target: "platform",
                    intent = intent_name,
                    error = %err,
                    "intent_handler_failed"
                );
                match error_hook {
                    Some(hook) => {
                        hook.on_error(request, &err.message).await;
                        Ok(())
                    }
                    None => Err(err),
                }
            }
        }
    }

    pub async fn dispatch_launch(
        &self,
        request: &mut dyn PlatformRequestPort,
    ) -> Result<(), PlatformError> {
        let handler = self
            .state
            .lock()
            .expect("lock poisoned")
            .launch
            .clone()
            .ok_or_else(|| dispatch_failed("no launch handler registered"))?;
        handler.on_launch(request).await
    }
}

impl PlatformAdapterPort for InlinePlatform {
    fn reg_intent(
        &self,
        registration: IntentRegistration,
        handler: Arc<dyn IntentHandlerPort>,
    ) -> Result<(), PlatformError> {
        if registration.name.trim().is_empty() {
            return Err(registration_invalid("intent name cannot be empty"));
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if state.intents.contains_key(&registration.name) {
            return Err(registration_invalid(format!(
                "intent '{}' is already registered",
                registration.name
            )));
        }
        state.intents.insert(
            registration.name.clone(),
            RegisteredIntent {
                registration,
                handler,
            },
        );
        Ok(())
    }

    fn reg_custom_slot(&self, type_name: &str, values: &[String]) -> Result<(), PlatformError> {
        if values.is_empty() {
            return Err(registration_invalid(format!(
                "custom slot type '{type_name}' has no values"
            )));
        }
        self.state
            .lock()
            .expect("lock poisoned")
            .custom_slots
            .insert(type_name.to_string(), values.to_vec());
        Ok(())
    }

    fn on_launch(&self, handler: Arc<dyn IntentHandlerPort>) -> Result<(), PlatformError> {
        self.state.lock().expect("lock poisoned").launch = Some(handler);
        Ok(())
    }

    fn on_error(&self, handler: Arc<dyn IntentHandlerPort>) -> Result<(), PlatformError> {
        self.state.lock().expect("lock poisoned").error = Some(handler);
        Ok(())
    }
}

/// Request object backing the inline platform. Session attributes carry
/// across turns via [`InlineRequest::next_turn`].
#[derive(Debug, Clone, Default)]
pub struct InlineRequest {
    user_id: String,
    slots: BTreeMap<String, String>,
    session: BTreeMap<String, String>,
    spoken: Option<String>,
    session_ended: bool,
}

impl InlineRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    /// A fresh request for the same conversation: session attributes
    /// carry over, per-turn fields reset.
    pub fn next_turn(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            session: self.session.clone(),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Option<&str> {
        self.spoken.as_deref()
    }

    pub fn session_ended(&self) -> bool {
        self.session_ended
    }
}

impl PlatformRequestPort for InlineRequest {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn slots(&self) -> BTreeMap<String, String> {
        self.slots.clone()
    }

    fn slot(&self, name: &str) -> Option<String> {
        self.slots.get(name).cloned()
    }

    fn session_attributes(&self) -> BTreeMap<String, String> {
        self.session.clone()
    }

    fn set_session_attribute(&mut self, key: &str, value: &str) {
        self.session.insert(key.to_string(), value.to_string());
    }

    fn say(&mut self, ssml: &str) {
        self.spoken = Some(ssml.to_string());
    }

    fn should_end_session(&mut self, end: bool) {
        self.session_ended = end;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl IntentHandlerPort for EchoHandler {
        async fn on_intent(
            &self,
            intent_name: &str,
            request: &mut dyn PlatformRequestPort,
        ) -> Result<(), PlatformError> {
            request.say(intent_name);
            Ok(())
        }

        async fn on_launch(
            &self,
            request: &mut dyn PlatformRequestPort,
        ) -> Result<(), PlatformError> {
            request.say("launched");
            Ok(())
        }

        async fn on_error(&self, request: &mut dyn PlatformRequestPort, _message: &str) {
            request.say("apology");
        }
    }

    fn registration(name: &str) -> IntentRegistration {
        IntentRegistration {
            name: name.to_string(),
            utterances: vec!["hello".to_string()],
            slots: Default::default(),
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_registered_handler() {
        let platform = InlinePlatform::new();
        platform
            .reg_intent(registration("GreetingIntent"), Arc::new(EchoHandler))
            .expect("registration should succeed");

        let mut request = InlineRequest::new("user-1");
        platform
            .dispatch_intent("GreetingIntent", &mut request)
            .await
            .expect("dispatch should succeed");
        assert_eq!(request.spoken(), Some("GreetingIntent"));
    }

    #[tokio::test]
    async fn unknown_intent_is_a_dispatch_error() {
        let platform = InlinePlatform::new();
        let mut request = InlineRequest::new("user-1");
        let err = platform
            .dispatch_intent("Missing", &mut request)
            .await
            .expect_err("unknown intent should fail");
        assert_eq!(err.kind, crate::platform::error::PlatformErrorKind::Dispatch);
    }

    #[test]
    fn duplicate_intent_names_are_rejected() {
        let platform = InlinePlatform::new();
        platform
            .reg_intent(registration("GreetingIntent"), Arc::new(EchoHandler))
            .expect("first registration should succeed");
        let err = platform
            .reg_intent(registration("GreetingIntent"), Arc::new(EchoHandler))
            .expect_err("duplicate should fail");
        assert_eq!(
            err.kind,
            crate::platform::error::PlatformErrorKind::Registration
        );
    }

    #[test]
    fn next_turn_keeps_session_only() {
        let mut request = InlineRequest::new("user-1").with_slot("airline", "Delta");
        request.set_session_attribute("seen", "yes");
        request.say("hello");

        let next = request.next_turn();
        assert_eq!(next.user_id(), "user-1");
        assert!(next.slots().is_empty());
        assert!(next.spoken().is_none());
        assert_eq!(
            next.session_attributes().get("seen").map(String::as_str),
            Some("yes")
        );
    }
}
