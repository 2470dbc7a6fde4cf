use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal::unix::{SignalKind, signal},
};

use syrinx::{
    cli::config_path_from_args,
    config::Config,
    dialog::{ConversationEngine, GoalDef, IntentDef, ResolverOutcome, sync_resolver},
    logging::init_tracing,
    platform::{InlinePlatform, InlineRequest, PlatformRequestPort},
    script::SlotType,
    store::InMemoryRecordStore,
};

/// Console driver: compiles a minimal diagnostic script against the
/// inline platform and replays turns typed on stdin. Hosts embedding
/// the engine register their own script and adapters instead.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;
    let _logging_guard = init_tracing(&config.logging).context("failed to initialize logging")?;

    let platform = Arc::new(InlinePlatform::new());
    let engine = build_diagnostic_engine(&config, platform.clone())?;

    eprintln!("syrinx console. commands: launch | intent <name> [slot=value ...] | intents | quit");
    run_console(&engine, &platform).await
}

fn build_diagnostic_engine(
    config: &Config,
    platform: Arc<InlinePlatform>,
) -> Result<Arc<ConversationEngine>> {
    let engine = ConversationEngine::new();
    engine.add_platform(platform);
    engine.set_persistent_store(Arc::new(InMemoryRecordStore::new()));
    if let Some(rate) = &config.engine.spoken_rate {
        engine.set_spoken_rate(rate.clone());
    }
    if let Some(seed) = config.engine.rng_seed {
        engine.set_rng_seed(seed);
    }

    engine.set_launch_phrases(["Hello.", "Hi, I'm listening."]);
    engine.set_close_requests(["goodbye", "stop"]);
    engine.add_input_types([("name", SlotType::free_text(["Ada", "Grace"]))]);
    engine.define_goal(
        GoalDef::query("name")
            .with_prompt("What should I call you?")
            .with_respond_to(IntentDef::new(
                ["My name is [[name]]"],
                sync_resolver(|response| {
                    let name = response.get("[[name]]").unwrap_or_default();
                    response.set("name", name);
                    response.say("Nice to meet you, {{name}}.");
                    Ok(ResolverOutcome::Complete)
                }),
            )),
    );
    engine.add_top_level_goal("name");

    engine
        .register_intents()
        .context("failed to compile the diagnostic script")?;
    Ok(engine)
}

async fn run_console(engine: &Arc<ConversationEngine>, platform: &InlinePlatform) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation = InlineRequest::new("console-user");

    loop {
        let line = tokio::select! {
            _ = sigint.recv() => break,
            _ = sigterm.recv() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let mut words = line.split_whitespace();

        match words.next() {
            None => continue,
            Some("quit") => break,
            Some("intents") => {
                for name in platform.intent_names() {
                    eprintln!("  {name}");
                }
            }
            Some("launch") => {
                let mut request = conversation.next_turn();
                match platform.dispatch_launch(&mut request).await {
                    Ok(()) => print_turn(&request),
                    Err(err) => eprintln!("launch failed: {err}"),
                }
                conversation = request;
            }
            Some("intent") => {
                let Some(name) = words.next() else {
                    eprintln!("usage: intent <name> [slot=value ...]");
                    continue;
                };
                let mut request = conversation.next_turn();
                for pair in words {
                    match pair.split_once('=') {
                        Some((slot, value)) => request = request.with_slot(slot, value),
                        None => eprintln!("ignoring malformed slot '{pair}'"),
                    }
                }
                match platform.dispatch_intent(name, &mut request).await {
                    Ok(()) => print_turn(&request),
                    Err(err) => eprintln!("dispatch failed: {err}"),
                }
                conversation = request;
            }
            Some(other) => eprintln!("unknown command '{other}'"),
        }

        if conversation.session_ended() {
            eprintln!("(conversation closed)");
            conversation = InlineRequest::new("console-user");
        }
    }

    eprintln!("syrinx stopped");
    Ok(())
}

fn print_turn(request: &InlineRequest) {
    match request.spoken() {
        Some(speech) => println!("{speech}"),
        None => println!("(no speech)"),
    }
    let state = request.session_attributes();
    if let Some(goals) = state.get("convoGoalState")
        && !goals.is_empty()
    {
        eprintln!("  goals: {goals}");
    }
}
