use crate::{
    dialog::error::{DialogError, internal_error},
    output::{OutputManager, Phrase, VariableSource},
    session::{GoalStack, Session},
    store::{PersistentRecord, SharedStore},
};

/// The three reference namespaces author callbacks can read and write:
/// `{{name}}` (or a bare name) addresses a session variable, `[[name]]`
/// a slot of the current request, `<<record.field>>` a field of the
/// loaded persistent record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    SessionVar(String),
    RequestSlot(String),
    RecordField { record: String, field: String },
}

fn parse_reference(raw: &str) -> Reference {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    {
        return Reference::SessionVar(inner.to_string());
    }
    if let Some(inner) = trimmed
        .strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
    {
        return Reference::RequestSlot(inner.to_string());
    }
    if let Some(inner) = trimmed
        .strip_prefix("<<")
        .and_then(|rest| rest.strip_suffix(">>"))
    {
        if let Some((record, field)) = inner.split_once('.') {
            return Reference::RecordField {
                record: record.to_string(),
                field: field.to_string(),
            };
        }
    }
    Reference::SessionVar(trimmed.to_string())
}

struct TurnVars<'a> {
    session: &'a Session,
    record: Option<&'a PersistentRecord>,
}

impl VariableSource for TurnVars<'_> {
    fn resolve_var(&self, name: &str) -> Option<String> {
        if let Some((record_name, field)) = name.split_once('.') {
            return self
                .record
                .filter(|record| record.name == record_name)
                .and_then(|record| record.field(field))
                .map(str::to_string);
        }
        self.session.get(name).map(str::to_string)
    }
}

/// Per-turn object handed to author callbacks: speech output, session
/// and slot access, goal-stack management, and persistent-store access.
pub struct Response {
    session: Session,
    output: OutputManager,
    store: Option<SharedStore>,
    record: Option<PersistentRecord>,
    goal_state_changed: bool,
}

impl Response {
    pub(crate) fn new(session: Session, output: OutputManager, store: Option<SharedStore>) -> Self {
        Self {
            session,
            output,
            store,
            record: None,
            goal_state_changed: false,
        }
    }

    pub fn say(&mut self, phrase: impl Into<Phrase>) {
        let phrase = phrase.into();
        self.emit_say(&phrase, false);
    }

    /// Like [`Response::say`] without the pause before this fragment.
    pub fn say_quick(&mut self, phrase: impl Into<Phrase>) {
        let phrase = phrase.into();
        self.emit_say(&phrase, true);
    }

    pub fn prompt(&mut self, phrase: impl Into<Phrase>) {
        let phrase = phrase.into();
        self.emit_prompt(&phrase);
    }

    pub fn ask(&mut self, phrase: impl Into<Phrase>) {
        let phrase = phrase.into();
        self.emit_ask(&phrase);
    }

    pub(crate) fn emit_say(&mut self, phrase: &Phrase, quick: bool) {
        let vars = TurnVars {
            session: &self.session,
            record: self.record.as_ref(),
        };
        self.output.say(phrase, quick, &vars);
    }

    pub(crate) fn emit_prompt(&mut self, phrase: &Phrase) {
        let vars = TurnVars {
            session: &self.session,
            record: self.record.as_ref(),
        };
        self.output.prompt(phrase, &vars);
    }

    pub(crate) fn emit_ask(&mut self, phrase: &Phrase) {
        let vars = TurnVars {
            session: &self.session,
            record: self.record.as_ref(),
        };
        self.output.ask(phrase, &vars);
    }

    /// Reads a reference in any of the three namespaces. Returns None
    /// when the target is unset.
    pub fn get(&self, reference: &str) -> Option<String> {
        match parse_reference(reference) {
            Reference::SessionVar(name) | Reference::RequestSlot(name) => {
                self.session.get(&name).map(str::to_string)
            }
            Reference::RecordField { record, field } => self
                .record
                .as_ref()
                .filter(|loaded| loaded.name == record)
                .and_then(|loaded| loaded.field(&field))
                .map(str::to_string),
        }
    }

    /// Writes a reference. Request-slot references are a read-only
    /// alias; writing one warns and is ignored.
    pub fn set(&mut self, reference: &str, value: impl Into<String>) {
        match parse_reference(reference) {
            Reference::SessionVar(name) => self.session.set(name, value),
            Reference::RequestSlot(name) => {
                tracing::warn!(
                    target: "dialog",
                    slot = %name,
                    "request_slot_references_are_read_only"
                );
            }
            Reference::RecordField { record, field } => match self.record.as_mut() {
                Some(loaded) if loaded.name == record => loaded.set_field(field, value),
                _ => {
                    tracing::warn!(
                        target: "dialog",
                        record = %record,
                        "no_loaded_record_for_field_write"
                    );
                }
            },
        }
    }

    /// Fetches a record from the persistent store and keeps it loaded
    /// for `<<record.field>>` access. Returns whether a row was found.
    pub async fn load(
        &mut self,
        record_name: &str,
        key_field: &str,
        key_value: &str,
        where_clause: Option<&str>,
    ) -> Result<bool, DialogError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| internal_error("no persistent store configured"))?;
        let loaded = store
            .load(record_name, key_field, key_value, where_clause)
            .await
            .map_err(|err| internal_error(format!("persistent load failed: {err}")))?;
        let found = loaded.is_some();
        self.record = loaded.or_else(|| Some(PersistentRecord::new(record_name)));
        Ok(found)
    }

    /// Upserts the loaded record back into the persistent store.
    pub async fn store(&mut self) -> Result<(), DialogError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| internal_error("no persistent store configured"))?;
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| internal_error("no record loaded to store"))?;
        store
            .store(record)
            .await
            .map_err(|err| internal_error(format!("persistent store failed: {err}")))
    }

    pub fn record(&self) -> Option<&PersistentRecord> {
        self.record.as_ref()
    }

    pub fn add_goal(&mut self, key: &str) {
        let mut stack = GoalStack::load(&self.session);
        stack.append(key);
        stack.save(&mut self.session);
        self.goal_state_changed = true;
    }

    pub fn clear_goal(&mut self, key: &str) {
        let mut stack = GoalStack::load(&self.session);
        if stack.remove(key) {
            stack.save(&mut self.session);
            self.goal_state_changed = true;
        }
    }

    pub fn has_goal(&self, key: &str) -> bool {
        GoalStack::load(&self.session).contains(key)
    }

    /// Dependency check: when the referenced slot is still empty, the
    /// child goal is queued (once) and the caller learns its
    /// dependencies are not met yet.
    pub fn goal_filled(&mut self, child_key: &str, slot_reference: &str) -> bool {
        let filled = self
            .get(slot_reference)
            .is_some_and(|value| !value.is_empty());
        if filled {
            return true;
        }
        if !self.has_goal(child_key) {
            self.add_goal(child_key);
        }
        false
    }

    /// Asks the platform to close the conversation after this turn.
    pub fn end_conversation(&mut self) {
        self.output.request_close();
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub(crate) fn output(&self) -> &OutputManager {
        &self.output
    }

    pub(crate) fn mark_goal_state_changed(&mut self) {
        self.goal_state_changed = true;
    }

    pub(crate) fn take_goal_state_changed(&mut self) -> bool {
        std::mem::take(&mut self.goal_state_changed)
    }

    pub(crate) fn finish(self) -> (Session, OutputManager) {
        (self.session, self.output)
    }
}
