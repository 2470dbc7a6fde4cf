use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    dialog::{
        error::{DialogError, registration_invalid},
        types::{GoalDef, IntentDef, ResolverOutcome, sync_resolver},
    },
    platform::IntentRegistration,
    script::{
        parser::compile_utterances,
        types::{PhraseEquivalents, SlotType, SlotTypeTable},
    },
    store::SharedStore,
};

/// Everything an author registered before `register_intents`.
#[derive(Default)]
pub(crate) struct EngineScript {
    pub slot_types: SlotTypeTable,
    pub equivalents: PhraseEquivalents,
    pub intents: Vec<IntentDef>,
    pub goals: Vec<GoalDef>,
    pub top_level_goals: Vec<String>,
    pub launch_phrases: Vec<String>,
    pub close_requests: Vec<String>,
    pub spoken_rate: Option<String>,
    pub store: Option<SharedStore>,
    pub rng_seed: Option<u64>,
}

/// Frozen dispatch state served after compilation.
pub(crate) struct CompiledTables {
    /// Platform intent name to the defs it may resolve to, in
    /// registration order. Singleton lists are local intents; longer
    /// lists are shared utterances selected by goal context.
    pub dispatch: BTreeMap<String, Vec<Arc<IntentDef>>>,
    pub goals: BTreeMap<String, Arc<GoalDef>>,
    pub top_level_goals: Vec<String>,
    pub launch_phrases: Vec<String>,
    pub spoken_rate: Option<String>,
    pub store: Option<SharedStore>,
    pub rng: Mutex<StdRng>,
}

pub(crate) struct CompileOutput {
    pub tables: CompiledTables,
    pub registrations: Vec<IntentRegistration>,
    pub custom_slots: Vec<(String, Vec<String>)>,
}

impl std::fmt::Debug for CompileOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOutput").finish_non_exhaustive()
    }
}

pub(crate) fn compile(mut script: EngineScript) -> Result<CompileOutput, DialogError> {
    validate_slot_types(&script.slot_types)?;
    desugar_goal_intents(&mut script);
    synthesize_close_intent(&mut script);
    let goals = validate_goals(std::mem::take(&mut script.goals))?;

    if script.intents.iter().any(|def| def.expecting.is_empty()) {
        return Err(registration_invalid("an intent must expect at least one utterance"));
    }

    let defs: Vec<Arc<IntentDef>> = script.intents.drain(..).map(Arc::new).collect();
    let mut names = reserve_author_names(&defs)?;

    // Group utterances by how many defs share them: a solely-owned
    // utterance batches into its def's own intent, a shared one becomes
    // a platform intent of its own whose def is picked per turn from
    // the goal stack.
    let mut shared_order: Vec<String> = Vec::new();
    let mut owners: BTreeMap<String, (String, Vec<usize>)> = BTreeMap::new();
    for (index, def) in defs.iter().enumerate() {
        for raw in &def.expecting {
            let key = raw.trim().to_lowercase();
            let entry = owners
                .entry(key.clone())
                .or_insert_with(|| (raw.trim().to_string(), Vec::new()));
            if !entry.1.contains(&index) {
                entry.1.push(index);
            }
            if !shared_order.contains(&key) {
                shared_order.push(key);
            }
        }
    }

    let mut dispatch: BTreeMap<String, Vec<Arc<IntentDef>>> = BTreeMap::new();
    let mut registrations = Vec::new();
    let mut generated_counter = 0usize;

    for (index, def) in defs.iter().enumerate() {
        let local: Vec<String> = def
            .expecting
            .iter()
            .filter(|raw| {
                owners
                    .get(&raw.trim().to_lowercase())
                    .is_some_and(|(_, indices)| indices.len() == 1)
            })
            .cloned()
            .collect();
        if local.is_empty() {
            continue;
        }

        let name = match &def.name {
            Some(name) => name.clone(),
            None => generate_name(&mut names, &mut generated_counter),
        };
        let compiled = compile_utterances(&local, &script.slot_types, &script.equivalents);
        registrations.push(IntentRegistration {
            name: name.clone(),
            utterances: compiled.utterances,
            slots: compiled.slots,
        });
        dispatch.insert(name, vec![Arc::clone(&defs[index])]);
    }

    for key in shared_order {
        let (raw, indices) = owners.get(&key).expect("owner map covers scan order");
        if indices.len() < 2 {
            continue;
        }
        let name = shared_intent_name(raw, &mut names, &mut generated_counter);
        let compiled =
            compile_utterances(&[raw.clone()], &script.slot_types, &script.equivalents);
        registrations.push(IntentRegistration {
            name: name.clone(),
            utterances: compiled.utterances,
            slots: compiled.slots,
        });
        dispatch.insert(
            name,
            indices.iter().map(|index| Arc::clone(&defs[*index])).collect(),
        );
    }

    let custom_slots = script
        .slot_types
        .iter()
        .filter_map(|(key, slot_type)| match slot_type {
            SlotType::CustomEnum { values } => Some((key.clone(), values.clone())),
            _ => None,
        })
        .collect();

    let rng = script
        .rng_seed
        .map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy);

    Ok(CompileOutput {
        tables: CompiledTables {
            dispatch,
            goals,
            top_level_goals: script.top_level_goals,
            launch_phrases: script.launch_phrases,
            spoken_rate: script.spoken_rate,
            store: script.store,
            rng: Mutex::new(rng),
        },
        registrations,
        custom_slots,
    })
}

fn validate_slot_types(types: &SlotTypeTable) -> Result<(), DialogError> {
    for (key, slot_type) in types {
        if let SlotType::CustomEnum { values } = slot_type
            && values.is_empty()
        {
            return Err(registration_invalid(format!(
                "custom slot type '{key}' declares no values"
            )));
        }
    }
    Ok(())
}

/// Moves nested `respond_to` entries up into the top-level intent list
/// with the enclosing goal injected as their scope.
fn desugar_goal_intents(script: &mut EngineScript) {
    for goal in &mut script.goals {
        for def in goal.respond_to.drain(..) {
            script.intents.push(def.scoped_to(goal.key.clone()));
        }
    }
}

fn synthesize_close_intent(script: &mut EngineScript) {
    if script.close_requests.is_empty() {
        return;
    }
    let expecting = std::mem::take(&mut script.close_requests);
    script.intents.push(
        IntentDef::new(
            expecting,
            sync_resolver(|response| {
                response.say("Goodbye.");
                response.end_conversation();
                Ok(ResolverOutcome::Complete)
            }),
        )
        .named("EndConversationIntent"),
    );
}

fn validate_goals(goals: Vec<GoalDef>) -> Result<BTreeMap<String, Arc<GoalDef>>, DialogError> {
    let mut table = BTreeMap::new();
    for goal in goals {
        if table.contains_key(&goal.key) {
            return Err(registration_invalid(format!(
                "goal key '{}' is declared twice",
                goal.key
            )));
        }
        let queries = goal.prompt.is_some() || goal.ask.is_some();
        if goal.resolve.is_some() && queries {
            return Err(registration_invalid(format!(
                "goal '{}' has both a resolver and a prompt/ask",
                goal.key
            )));
        }
        if goal.resolve.is_none() && !queries {
            return Err(registration_invalid(format!(
                "goal '{}' needs a resolver or a prompt/ask",
                goal.key
            )));
        }
        table.insert(goal.key.clone(), Arc::new(goal));
    }
    Ok(table)
}

fn reserve_author_names(defs: &[Arc<IntentDef>]) -> Result<BTreeSet<String>, DialogError> {
    let mut names = BTreeSet::new();
    for def in defs {
        let Some(name) = &def.name else { continue };
        if !name.chars().all(|ch| ch.is_ascii_alphabetic()) || name.is_empty() {
            return Err(registration_invalid(format!(
                "intent name '{name}' must be alphabetic and digit-free"
            )));
        }
        if !names.insert(name.clone()) {
            return Err(registration_invalid(format!(
                "intent name '{name}' is declared twice"
            )));
        }
    }
    Ok(names)
}

/// Digit-free generated names: a base-26 letter spelling of a counter,
/// advanced past any name already taken.
fn generate_name(names: &mut BTreeSet<String>, counter: &mut usize) -> String {
    loop {
        let candidate = format!("Intent{}", alpha_index(*counter));
        *counter += 1;
        if names.insert(candidate.clone()) {
            return candidate;
        }
    }
}

fn shared_intent_name(
    utterance: &str,
    names: &mut BTreeSet<String>,
    counter: &mut usize,
) -> String {
    let mut base = String::new();
    let mut upper_next = true;
    for ch in utterance.chars() {
        if ch.is_ascii_alphabetic() {
            base.push(if upper_next {
                ch.to_ascii_uppercase()
            } else {
                ch.to_ascii_lowercase()
            });
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if base.is_empty() {
        return generate_name(names, counter);
    }
    let candidate = format!("{base}Intent");
    if names.insert(candidate.clone()) {
        return candidate;
    }
    generate_name(names, counter)
}

fn alpha_index(mut value: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (value % 26) as u8);
        value /= 26;
        if value == 0 {
            break;
        }
        value -= 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("letters are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Phrase;

    fn noop() -> crate::dialog::types::Resolver {
        sync_resolver(|_| Ok(ResolverOutcome::Complete))
    }

    fn script_with_intents(intents: Vec<IntentDef>) -> EngineScript {
        EngineScript {
            intents,
            rng_seed: Some(1),
            ..EngineScript::default()
        }
    }

    #[test]
    fn local_utterances_batch_into_one_intent_per_def() {
        let output = compile(script_with_intents(vec![
            IntentDef::new(["hello", "hi there"], noop()).named("GreetingIntent"),
        ]))
        .expect("compile should succeed");

        assert_eq!(output.registrations.len(), 1);
        let registration = &output.registrations[0];
        assert_eq!(registration.name, "GreetingIntent");
        assert_eq!(registration.utterances.len(), 2);
        assert_eq!(output.tables.dispatch["GreetingIntent"].len(), 1);
    }

    #[test]
    fn shared_utterances_become_their_own_intent() {
        let output = compile(script_with_intents(vec![
            IntentDef::new(["yes", "sure"], noop()).scoped_to("first"),
            IntentDef::new(["yes"], noop()).scoped_to("second"),
        ]))
        .expect("compile should succeed");

        let shared = output
            .registrations
            .iter()
            .find(|registration| registration.name == "YesIntent")
            .expect("shared utterance intent should exist");
        assert_eq!(shared.utterances, vec!["yes".to_string()]);
        assert_eq!(output.tables.dispatch["YesIntent"].len(), 2);
        // "sure" stays local to the first def under a generated name.
        assert_eq!(output.tables.dispatch["IntentA"].len(), 1);
    }

    #[test]
    fn generated_names_are_digit_free_and_collision_checked() {
        let output = compile(script_with_intents(vec![
            IntentDef::new(["alpha utterance"], noop()).named("IntentA"),
            IntentDef::new(["beta utterance"], noop()),
        ]))
        .expect("compile should succeed");

        let generated: Vec<&str> = output
            .registrations
            .iter()
            .map(|registration| registration.name.as_str())
            .collect();
        assert!(generated.contains(&"IntentA"));
        assert!(generated.contains(&"IntentB"));
        for name in generated {
            assert!(name.chars().all(|ch| ch.is_ascii_alphabetic()));
        }
    }

    #[test]
    fn alpha_index_wraps_past_z() {
        assert_eq!(alpha_index(0), "A");
        assert_eq!(alpha_index(25), "Z");
        assert_eq!(alpha_index(26), "AA");
        assert_eq!(alpha_index(27), "AB");
    }

    #[test]
    fn duplicate_goal_keys_are_fatal() {
        let mut script = script_with_intents(Vec::new());
        script.goals = vec![
            GoalDef::query("checkIn").with_prompt("How are you?"),
            GoalDef::query("checkIn").with_ask("Ready?"),
        ];
        let err = compile(script).expect_err("duplicate goal should fail");
        assert_eq!(err.kind, crate::dialog::error::DialogErrorKind::Registration);
    }

    #[test]
    fn goal_shape_must_be_resolver_xor_query() {
        let mut script = script_with_intents(Vec::new());
        let mut both = GoalDef::resolver_goal("broken", noop());
        both.prompt = Some(Phrase::from("also a prompt"));
        script.goals = vec![both];
        assert!(compile(script).is_err());

        let mut script = script_with_intents(Vec::new());
        script.goals = vec![GoalDef::query("empty")];
        assert!(compile(script).is_err());
    }

    #[test]
    fn empty_custom_enum_is_fatal() {
        let mut script = script_with_intents(Vec::new());
        script.slot_types.insert(
            "color".to_string(),
            SlotType::CustomEnum { values: Vec::new() },
        );
        assert!(compile(script).is_err());
    }

    #[test]
    fn nested_respond_to_is_desugared_with_the_goal_scope() {
        let mut script = script_with_intents(Vec::new());
        script.goals = vec![
            GoalDef::query("airline")
                .with_prompt("What airline?")
                .with_respond_to(IntentDef::new(["[[airline]]"], noop())),
        ];
        let output = compile(script).expect("compile should succeed");
        let defs = output
            .tables
            .dispatch
            .values()
            .next()
            .expect("one intent should compile");
        assert_eq!(defs[0].goal.as_deref(), Some("airline"));
    }

    #[test]
    fn close_requests_compile_into_a_builtin_intent() {
        let mut script = script_with_intents(Vec::new());
        script.close_requests = vec!["goodbye".to_string(), "stop".to_string()];
        let output = compile(script).expect("compile should succeed");
        assert!(output.tables.dispatch.contains_key("EndConversationIntent"));
    }

    #[test]
    fn custom_enum_values_are_exported_for_platform_registration() {
        let mut script = script_with_intents(Vec::new());
        script.slot_types.insert(
            "color".to_string(),
            SlotType::custom_enum(["red", "green"]),
        );
        let output = compile(script).expect("compile should succeed");
        assert_eq!(
            output.custom_slots,
            vec![("color".to_string(), vec!["red".to_string(), "green".to_string()])]
        );
    }
}
