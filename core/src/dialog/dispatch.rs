use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::{
    dialog::{
        compile::CompiledTables,
        error::{DialogError, dispatch_failed},
        response::Response,
        types::{IntentDef, ResolverOutcome},
    },
    output::{OutputManager, Phrase},
    platform::PlatformRequestPort,
    session::{GoalStack, Session},
};

/// Spoken when a turn fails inside an author callback; platforms treat
/// an empty response as an error, so the apology always goes out.
pub(crate) const FAILURE_APOLOGY: &str =
    "Sorry, I'm having trouble with that right now. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoopStats {
    pub iterations: usize,
}

/// Drives one inbound intent: slots into session, def selection by
/// goal context, the triggering resolver, the goal loop, then flush.
pub(crate) async fn run_intent_turn(
    tables: &CompiledTables,
    intent_name: &str,
    request: &mut dyn PlatformRequestPort,
) -> Result<(), DialogError> {
    let defs = tables
        .dispatch
        .get(intent_name)
        .ok_or_else(|| dispatch_failed(format!("no definition for intent '{intent_name}'")))?;

    let mut session = Session::from_attributes(request.session_attributes());
    for (name, value) in request.slots() {
        session.set(name, value);
    }

    let def = select_def(defs, &GoalStack::load(&session), intent_name);
    let mut response = new_response(tables, session);

    let outcome = (def.resolve)(&mut response).await?;
    if outcome == ResolverOutcome::Complete
        && let Some(goal) = &def.goal
    {
        let mut stack = GoalStack::load(response.session());
        if stack.remove(goal) {
            stack.save(response.session_mut());
            response.mark_goal_state_changed();
        }
    }

    run_goal_loop(tables, &mut response).await?;
    flush(response, request);
    Ok(())
}

/// Launch turn: no matched intent; a random launch phrase, the
/// top-level goals pushed if missing, then the goal loop.
pub(crate) async fn run_launch_turn(
    tables: &CompiledTables,
    request: &mut dyn PlatformRequestPort,
) -> Result<(), DialogError> {
    let session = Session::from_attributes(request.session_attributes());
    let mut response = new_response(tables, session);

    if !tables.launch_phrases.is_empty() {
        let greeting = Phrase::AnyOf(tables.launch_phrases.clone());
        response.emit_say(&greeting, false);
    }
    for key in &tables.top_level_goals {
        if !response.has_goal(key) {
            response.add_goal(key);
        }
    }

    run_goal_loop(tables, &mut response).await?;
    flush(response, request);
    Ok(())
}

/// Composes a generic apology in place of a failed turn. The session
/// keeps its pre-turn state; nothing else is written back.
pub(crate) fn speak_failure(request: &mut dyn PlatformRequestPort) {
    request.say(FAILURE_APOLOGY);
    request.should_end_session(false);
}

fn new_response(tables: &CompiledTables, session: Session) -> Response {
    let output = OutputManager::new(tables.spoken_rate.clone(), turn_rng(tables));
    Response::new(session, output, tables.store.clone())
}

fn turn_rng(tables: &CompiledTables) -> StdRng {
    let seed = tables.rng.lock().expect("lock poisoned").next_u64();
    StdRng::seed_from_u64(seed)
}

/// A single definition matches unconditionally. A shared utterance
/// walks the goal stack top-down and takes the first definition whose
/// goal matches a frame; with no goal context the first registration
/// wins and a warning is logged.
pub(crate) fn select_def<'d>(
    defs: &'d [std::sync::Arc<IntentDef>],
    stack: &GoalStack,
    intent_name: &str,
) -> &'d std::sync::Arc<IntentDef> {
    if defs.len() == 1 {
        return &defs[0];
    }
    for depth in 0..stack.len() {
        let Some(frame) = stack.top(depth) else { break };
        if let Some(def) = defs
            .iter()
            .find(|def| def.goal.as_deref() == Some(frame.key.as_str()))
        {
            return def;
        }
    }
    tracing::warn!(
        target: "dialog",
        intent = intent_name,
        "no_goal_context_for_shared_utterance_falling_back_to_first_registration"
    );
    &defs[0]
}

/// The goal-resolution loop. Each iteration either resolves and
/// removes a frame, marks a query frame as spoken, or proves nothing
/// is left to do; it halts once a full question has been queued.
///
/// `last_seen` guards against resolvers that signal change without
/// changing anything: it carries the frame of the previous iteration
/// only when that iteration mutated nothing, so re-reading the same
/// frame with no progress in between ends the loop.
pub(crate) async fn run_goal_loop(
    tables: &CompiledTables,
    response: &mut Response,
) -> Result<LoopStats, DialogError> {
    let mut stats = LoopStats::default();
    let mut cursor: isize = -1;
    let mut last_seen: Option<crate::session::GoalFrame> = None;

    while response.output().asked() < 1.0 {
        stats.iterations += 1;
        if response.take_goal_state_changed() {
            cursor = -1;
        }
        cursor += 1;

        let stack = GoalStack::load(response.session());
        let Some(frame) = stack.top(cursor as usize).cloned() else {
            break;
        };
        if last_seen.as_ref() == Some(&frame) {
            break;
        }

        let Some(def) = tables.goals.get(&frame.key) else {
            tracing::error!(
                target: "dialog",
                goal = %frame.key,
                "unknown_goal_frame_aborting_loop"
            );
            break;
        };

        if let Some(resolve) = &def.resolve {
            let outcome = resolve(response).await?;
            let mut removed = false;
            if outcome == ResolverOutcome::Complete {
                let mut stack = GoalStack::load(response.session());
                removed = stack.remove(&frame.key);
                if removed {
                    stack.save(response.session_mut());
                    response.mark_goal_state_changed();
                }
            }
            last_seen = if removed { None } else { Some(frame) };
        } else if frame.queried {
            // Already spoken for this conversation; the cursor moves on.
            last_seen = Some(frame);
        } else {
            if let Some(prompt) = &def.prompt {
                response.emit_prompt(prompt);
            } else if let Some(ask) = &def.ask {
                response.emit_ask(ask);
            }
            let mut queried = frame.clone();
            queried.queried = true;
            let mut stack = GoalStack::load(response.session());
            stack.update_at(cursor as usize, queried);
            stack.save(response.session_mut());
            last_seen = None;
        }
    }

    Ok(stats)
}

fn flush(response: Response, request: &mut dyn PlatformRequestPort) {
    let (session, mut output) = response.finish();
    let composed = output.compose();
    for (key, value) in session.into_attributes() {
        request.set_session_attribute(&key, &value);
    }
    if !composed.text.is_empty() {
        request.say(&composed.text);
    }
    request.should_end_session(composed.end_session);
}
