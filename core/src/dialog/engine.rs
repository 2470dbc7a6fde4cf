use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::{
    dialog::{
        compile::{CompiledTables, EngineScript, compile},
        dispatch::{run_intent_turn, run_launch_turn, speak_failure},
        error::{DialogError, internal_error, registration_invalid},
        types::{GoalDef, IntentDef},
    },
    platform::{
        IntentHandlerPort, PlatformAdapterPort, PlatformError, PlatformRegistry,
        PlatformRequestPort, error::dispatch_failed,
    },
    script::types::SlotType,
    store::SharedStore,
};

/// The conversation engine: authors register slot types, intents, and
/// goals, then compile the tables once with
/// [`ConversationEngine::register_intents`]. After compilation the
/// tables are frozen and the engine serves turns through the platform
/// handler callbacks; any further registration call panics.
pub struct ConversationEngine {
    script: Mutex<Option<EngineScript>>,
    platforms: Mutex<Option<PlatformRegistry>>,
    compiled: OnceLock<Arc<CompiledTables>>,
}

impl ConversationEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Some(EngineScript::default())),
            platforms: Mutex::new(Some(PlatformRegistry::new())),
            compiled: OnceLock::new(),
        })
    }

    fn with_script<R>(&self, mutate: impl FnOnce(&mut EngineScript) -> R) -> R {
        let mut guard = self.script.lock().expect("lock poisoned");
        let script = guard
            .as_mut()
            .expect("registration is frozen after register_intents");
        mutate(script)
    }

    pub fn add_platform(&self, adapter: Arc<dyn PlatformAdapterPort>) {
        let mut guard = self.platforms.lock().expect("lock poisoned");
        guard
            .as_mut()
            .expect("registration is frozen after register_intents")
            .add(adapter);
    }

    /// Accumulates slot types; a re-declared key takes the last write.
    pub fn add_input_types<I, K>(&self, types: I)
    where
        I: IntoIterator<Item = (K, SlotType)>,
        K: Into<String>,
    {
        self.with_script(|script| {
            for (key, slot_type) in types {
                script.slot_types.insert(key.into(), slot_type);
            }
        });
    }

    pub fn add_phrase_equivalents<I, S>(&self, sets: I)
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_script(|script| {
            for set in sets {
                script.equivalents.add_set(set);
            }
        });
    }

    pub fn respond_to(&self, def: IntentDef) {
        self.with_script(|script| script.intents.push(def));
    }

    pub fn define_goal(&self, def: GoalDef) {
        self.with_script(|script| script.goals.push(def));
    }

    /// A goal the engine re-pushes on launch when it is not already on
    /// the stack.
    pub fn add_top_level_goal(&self, key: impl Into<String>) {
        self.with_script(|script| script.top_level_goals.push(key.into()));
    }

    pub fn set_launch_phrases<I, S>(&self, phrases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_script(|script| {
            script.launch_phrases = phrases.into_iter().map(Into::into).collect();
        });
    }

    pub fn set_close_requests<I, S>(&self, requests: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_script(|script| {
            script.close_requests = requests.into_iter().map(Into::into).collect();
        });
    }

    pub fn set_spoken_rate(&self, rate: impl Into<String>) {
        self.with_script(|script| script.spoken_rate = Some(rate.into()));
    }

    pub fn set_persistent_store(&self, store: SharedStore) {
        self.with_script(|script| script.store = Some(store));
    }

    /// Seeds the phrase-pick RNG; tests use this for determinism.
    pub fn set_rng_seed(&self, seed: u64) {
        self.with_script(|script| script.rng_seed = Some(seed));
    }

    /// Compiles the registered script into frozen intent tables and
    /// fans the platform registrations out to every connected adapter.
    /// Must be called exactly once, after all registrations.
    pub fn register_intents(self: &Arc<Self>) -> Result<(), DialogError> {
        let script = self
            .script
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or_else(|| registration_invalid("register_intents may only be called once"))?;
        let output = compile(script)?;

        let platforms = self
            .platforms
            .lock()
            .expect("lock poisoned")
            .take()
            .unwrap_or_default();
        let handler: Arc<dyn IntentHandlerPort> = Arc::clone(self) as Arc<dyn IntentHandlerPort>;

        for (type_name, values) in &output.custom_slots {
            platforms
                .reg_custom_slot(type_name, values)
                .map_err(|err| registration_invalid(err.to_string()))?;
        }
        for registration in &output.registrations {
            platforms
                .reg_intent(registration, &handler)
                .map_err(|err| registration_invalid(err.to_string()))?;
        }
        platforms
            .on_launch(&handler)
            .and_then(|()| platforms.on_error(&handler))
            .map_err(|err| registration_invalid(err.to_string()))?;

        tracing::info!(
            target: "dialog",
            intents = output.registrations.len(),
            custom_slots = output.custom_slots.len(),
            "intent_tables_compiled"
        );

        self.compiled
            .set(Arc::new(output.tables))
            .map_err(|_| internal_error("intent tables are already compiled"))
    }

    fn tables(&self) -> Result<Arc<CompiledTables>, DialogError> {
        self.compiled
            .get()
            .cloned()
            .ok_or_else(|| internal_error("dispatch before register_intents"))
    }
}

#[async_trait]
impl IntentHandlerPort for ConversationEngine {
    async fn on_intent(
        &self,
        intent_name: &str,
        request: &mut dyn PlatformRequestPort,
    ) -> Result<(), PlatformError> {
        let tables = self
            .tables()
            .map_err(|err| dispatch_failed(err.to_string()))?;
        run_intent_turn(&tables, intent_name, request)
            .await
            .map_err(|err| {
                tracing::warn!(
                    target: "dialog",
                    intent = intent_name,
                    error = %err,
                    "turn_failed"
                );
                dispatch_failed(err.to_string())
            })
    }

    async fn on_launch(&self, request: &mut dyn PlatformRequestPort) -> Result<(), PlatformError> {
        let tables = self
            .tables()
            .map_err(|err| dispatch_failed(err.to_string()))?;
        run_launch_turn(&tables, request)
            .await
            .map_err(|err| dispatch_failed(err.to_string()))
    }

    async fn on_error(&self, request: &mut dyn PlatformRequestPort, message: &str) {
        tracing::warn!(target: "dialog", error = message, "composing_failure_apology");
        speak_failure(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::types::{ResolverOutcome, sync_resolver};
    use crate::platform::InlinePlatform;

    fn greeting_def() -> IntentDef {
        IntentDef::new(
            ["Hello"],
            sync_resolver(|response| {
                response.say("Hi");
                Ok(ResolverOutcome::Complete)
            }),
        )
        .named("GreetingIntent")
    }

    #[test]
    fn register_intents_fans_out_to_platforms() {
        let platform = Arc::new(InlinePlatform::new());
        let engine = ConversationEngine::new();
        engine.add_platform(platform.clone());
        engine.add_input_types([("color", SlotType::custom_enum(["red", "green"]))]);
        engine.respond_to(greeting_def());
        engine.register_intents().expect("compile should succeed");

        assert_eq!(platform.intent_names(), vec!["GreetingIntent".to_string()]);
        assert_eq!(
            platform.custom_slot_values("color"),
            Some(vec!["red".to_string(), "green".to_string()])
        );
    }

    #[test]
    fn register_intents_is_single_shot() {
        let engine = ConversationEngine::new();
        engine.respond_to(greeting_def());
        engine.register_intents().expect("compile should succeed");
        let err = engine
            .register_intents()
            .expect_err("second compile should fail");
        assert_eq!(err.kind, crate::dialog::error::DialogErrorKind::Registration);
    }

    #[test]
    #[should_panic(expected = "registration is frozen")]
    fn registration_after_compile_panics() {
        let engine = ConversationEngine::new();
        engine.respond_to(greeting_def());
        engine.register_intents().expect("compile should succeed");
        engine.respond_to(greeting_def());
    }

    #[tokio::test]
    async fn dispatch_before_compile_is_an_error() {
        let engine = ConversationEngine::new();
        let mut request = crate::platform::InlineRequest::new("user-1");
        let err = engine
            .on_intent("GreetingIntent", &mut request)
            .await
            .expect_err("dispatch should fail before compile");
        assert_eq!(err.kind, crate::platform::PlatformErrorKind::Dispatch);
    }
}
