use std::sync::Arc;

use syrinx::{
    dialog::{ConversationEngine, GoalDef, IntentDef, ResolverOutcome, sync_resolver},
    platform::{InlinePlatform, InlineRequest, PlatformRequestPort},
    script::SlotType,
};

const GOAL_STATE_SLOT: &str = "convoGoalState";

fn engine_on(platform: &Arc<InlinePlatform>) -> Arc<ConversationEngine> {
    let engine = ConversationEngine::new();
    engine.add_platform(platform.clone());
    engine.set_rng_seed(42);
    engine
}

fn goal_state(request: &InlineRequest) -> String {
    request
        .session_attributes()
        .get(GOAL_STATE_SLOT)
        .cloned()
        .unwrap_or_default()
}

#[tokio::test]
async fn single_turn_intent_with_no_goals() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.respond_to(
        IntentDef::new(
            ["Hello"],
            sync_resolver(|response| {
                response.say("Hi");
                Ok(ResolverOutcome::Complete)
            }),
        )
        .named("GreetingIntent"),
    );
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    platform
        .dispatch_intent("GreetingIntent", &mut request)
        .await
        .expect("dispatch should succeed");

    assert_eq!(request.spoken(), Some("Hi"));
    assert!(!request.session_ended(), "session stays open");
    assert_eq!(goal_state(&request), "");
}

#[tokio::test]
async fn prompt_goal_elicits_then_fills_a_slot() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.add_input_types([("airline", SlotType::free_text(["Delta", "United"]))]);
    engine.define_goal(
        GoalDef::query("airline")
            .with_prompt("What airline?")
            .with_respond_to(
                IntentDef::new(
                    ["[[airline]]"],
                    sync_resolver(|response| {
                        let airline = response.get("[[airline]]").unwrap_or_default();
                        response.set("airline", airline);
                        Ok(ResolverOutcome::Complete)
                    }),
                )
                .named("AirlineNameIntent"),
            ),
    );
    engine.register_intents().expect("compile should succeed");

    // First turn: the goal is live, so launch elicits the prompt.
    let mut first = InlineRequest::new("user-1");
    first.set_session_attribute(GOAL_STATE_SLOT, "airline");
    platform
        .dispatch_launch(&mut first)
        .await
        .expect("launch should succeed");
    assert!(
        first.spoken().is_some_and(|text| text.contains("What airline?")),
        "prompt should be spoken, got {:?}",
        first.spoken()
    );
    assert_eq!(goal_state(&first), "airline:queried");

    // Second turn: the slot arrives, the resolver fills the session
    // variable, and the goal pops with no speech left to say.
    let mut second = first.next_turn().with_slot("airline", "Delta");
    platform
        .dispatch_intent("AirlineNameIntent", &mut second)
        .await
        .expect("dispatch should succeed");
    assert_eq!(second.spoken(), None);
    assert_eq!(goal_state(&second), "");
    assert_eq!(
        second.session_attributes().get("airline").map(String::as_str),
        Some("Delta")
    );
}

#[tokio::test]
async fn dependency_chain_completes_across_turns() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.add_input_types([("bloodSugar", SlotType::built_in("NUMBER"))]);
    engine.define_goal(GoalDef::resolver_goal(
        "checkInDetails",
        sync_resolver(|response| {
            if response.goal_filled("bloodSugar", "[[bloodSugar]]") {
                response.say("Thanks, your check-in is done.");
                Ok(ResolverOutcome::Complete)
            } else {
                Ok(ResolverOutcome::Pending)
            }
        }),
    ));
    engine.define_goal(
        GoalDef::query("bloodSugar")
            .with_prompt("What is your blood sugar level?")
            .with_respond_to(
                IntentDef::new(
                    ["It is [[bloodSugar]]"],
                    sync_resolver(|response| {
                        let value = response.get("[[bloodSugar]]").unwrap_or_default();
                        response.set("bloodSugar", value);
                        Ok(ResolverOutcome::Complete)
                    }),
                )
                .named("BloodSugarIntent"),
            ),
    );
    engine.register_intents().expect("compile should succeed");

    let mut first = InlineRequest::new("user-1");
    first.set_session_attribute(GOAL_STATE_SLOT, "checkInDetails");
    platform
        .dispatch_launch(&mut first)
        .await
        .expect("launch should succeed");
    assert!(
        first
            .spoken()
            .is_some_and(|text| text.contains("What is your blood sugar level?"))
    );
    assert_eq!(goal_state(&first), "checkInDetails;bloodSugar:queried");

    let mut second = first.next_turn().with_slot("bloodSugar", "110");
    platform
        .dispatch_intent("BloodSugarIntent", &mut second)
        .await
        .expect("dispatch should succeed");
    assert_eq!(second.spoken(), Some("Thanks, your check-in is done."));
    assert_eq!(goal_state(&second), "");
}

#[tokio::test]
async fn stacked_prompts_collapse_into_one_question() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.define_goal(GoalDef::query("first").with_prompt("p1"));
    engine.define_goal(GoalDef::query("second").with_prompt("p2"));
    engine.define_goal(GoalDef::query("third").with_prompt("p3"));
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    // "first" is appended last so it sits on top of the stack.
    request.set_session_attribute(GOAL_STATE_SLOT, "third;second;first");
    platform
        .dispatch_launch(&mut request)
        .await
        .expect("launch should succeed");

    assert_eq!(
        request.spoken(),
        Some(r#"<break time="500ms"/> p1, p2 or p3"#)
    );
}

#[tokio::test]
async fn shared_utterance_resolves_by_goal_context() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    for scope in ["alpha", "beta", "gamma"] {
        engine.respond_to(
            IntentDef::new(
                ["Yes"],
                sync_resolver(move |response| {
                    response.say(format!("confirmed {scope}"));
                    Ok(ResolverOutcome::Complete)
                }),
            )
            .scoped_to(scope),
        );
    }
    engine.register_intents().expect("compile should succeed");

    // "beta" is on top of the stack, so its def wins.
    let mut request = InlineRequest::new("user-1");
    request.set_session_attribute(GOAL_STATE_SLOT, "alpha;beta");
    platform
        .dispatch_intent("YesIntent", &mut request)
        .await
        .expect("dispatch should succeed");
    assert_eq!(request.spoken(), Some("confirmed beta"));

    let mut request = InlineRequest::new("user-2");
    request.set_session_attribute(GOAL_STATE_SLOT, "alpha");
    platform
        .dispatch_intent("YesIntent", &mut request)
        .await
        .expect("dispatch should succeed");
    assert_eq!(request.spoken(), Some("confirmed alpha"));

    // No goal context: first registration wins with a warning.
    let mut request = InlineRequest::new("user-3");
    platform
        .dispatch_intent("YesIntent", &mut request)
        .await
        .expect("dispatch should succeed");
    assert_eq!(request.spoken(), Some("confirmed alpha"));
}

#[tokio::test]
async fn launch_speaks_one_configured_phrase_exactly() {
    let phrases = ["Welcome back.", "Hello there.", "Good to hear you."];
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.set_launch_phrases(phrases);
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    platform
        .dispatch_launch(&mut request)
        .await
        .expect("launch should succeed");

    let spoken = request.spoken().expect("launch must speak");
    assert!(phrases.contains(&spoken), "unexpected launch phrase {spoken:?}");
    assert!(!request.session_ended());
    assert_eq!(goal_state(&request), "");
}

#[tokio::test]
async fn launch_pushes_missing_top_level_goals() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.define_goal(GoalDef::query("checkIn").with_ask("How are you feeling today?"));
    engine.add_top_level_goal("checkIn");
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    platform
        .dispatch_launch(&mut request)
        .await
        .expect("launch should succeed");
    assert!(
        request
            .spoken()
            .is_some_and(|text| text.contains("How are you feeling today?"))
    );
    assert_eq!(goal_state(&request), "checkIn:queried");

    // A second launch must not stack a duplicate frame.
    let mut again = request.next_turn();
    platform
        .dispatch_launch(&mut again)
        .await
        .expect("launch should succeed");
    assert_eq!(goal_state(&again), "checkIn:queried");
}

#[tokio::test]
async fn resolver_failure_routes_to_the_apology_hook() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.respond_to(
        IntentDef::new(
            ["break things"],
            sync_resolver(|_| {
                Err(syrinx::dialog::error::resolver_failure(
                    "backend unavailable",
                ))
            }),
        )
        .named("BreakIntent"),
    );
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    request.set_session_attribute("precious", "kept");
    platform
        .dispatch_intent("BreakIntent", &mut request)
        .await
        .expect("error hook should absorb the failure");

    assert_eq!(
        request.spoken(),
        Some("Sorry, I'm having trouble with that right now. Please try again.")
    );
    assert!(!request.session_ended());
    // The failed turn never flushed, so the session kept its pre-turn state.
    assert_eq!(
        request.session_attributes().get("precious").map(String::as_str),
        Some("kept")
    );
}

#[tokio::test]
async fn close_requests_end_the_session() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.set_close_requests(["goodbye", "stop"]);
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    platform
        .dispatch_intent("EndConversationIntent", &mut request)
        .await
        .expect("dispatch should succeed");
    assert_eq!(request.spoken(), Some("Goodbye."));
    assert!(request.session_ended());
}

#[tokio::test]
async fn spoken_rate_wraps_the_whole_response() {
    let platform = Arc::new(InlinePlatform::new());
    let engine = engine_on(&platform);
    engine.set_spoken_rate("slow");
    engine.respond_to(
        IntentDef::new(
            ["Hello"],
            sync_resolver(|response| {
                response.say("Hi & welcome");
                Ok(ResolverOutcome::Complete)
            }),
        )
        .named("GreetingIntent"),
    );
    engine.register_intents().expect("compile should succeed");

    let mut request = InlineRequest::new("user-1");
    platform
        .dispatch_intent("GreetingIntent", &mut request)
        .await
        .expect("dispatch should succeed");
    assert_eq!(
        request.spoken(),
        Some(r#"<prosody rate="slow">Hi and welcome</prosody>"#)
    );
}
