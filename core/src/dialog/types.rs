use std::{fmt, sync::Arc};

use futures_util::future::BoxFuture;

use crate::{dialog::error::DialogError, dialog::response::Response, output::Phrase};

/// What an author callback reports back to the goal loop. `Complete`
/// (or a callback that has nothing to report) removes the frame the
/// callback was invoked for; `Pending` keeps it on the stack for a
/// later turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverOutcome {
    Complete,
    Pending,
}

pub type ResolverFuture<'a> = BoxFuture<'a, Result<ResolverOutcome, DialogError>>;

/// Author callback invoked with the per-turn [`Response`]. Async is the
/// one supported shape; plain synchronous callbacks are adapted at the
/// boundary by [`sync_resolver`].
pub type Resolver = Arc<dyn for<'a> Fn(&'a mut Response) -> ResolverFuture<'a> + Send + Sync>;

pub fn resolver<F>(callback: F) -> Resolver
where
    F: for<'a> Fn(&'a mut Response) -> ResolverFuture<'a> + Send + Sync + 'static,
{
    Arc::new(callback)
}

pub fn sync_resolver<F>(callback: F) -> Resolver
where
    F: Fn(&mut Response) -> Result<ResolverOutcome, DialogError> + Send + Sync + 'static,
{
    resolver(move |response| {
        let result = callback(response);
        Box::pin(async move { result })
    })
}

/// One author-declared intent: the utterances it expects and the
/// callback that handles it. `goal` scopes the intent to turns where
/// that goal is on the stack; `name` is author-supplied or generated
/// at compile time (alphabetic, digit-free).
#[derive(Clone)]
pub struct IntentDef {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub expecting: Vec<String>,
    pub resolve: Resolver,
}

impl IntentDef {
    pub fn new(
        expecting: impl IntoIterator<Item = impl Into<String>>,
        resolve: Resolver,
    ) -> Self {
        Self {
            name: None,
            goal: None,
            expecting: expecting.into_iter().map(Into::into).collect(),
            resolve,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scoped_to(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }
}

impl fmt::Debug for IntentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentDef")
            .field("name", &self.name)
            .field("goal", &self.goal)
            .field("expecting", &self.expecting)
            .finish_non_exhaustive()
    }
}

/// One author-declared goal. Exactly one shape is valid: a resolver
/// goal (`resolve` set, no prompt/ask) or a query goal (`prompt` or
/// `ask` set). Nested `respond_to` entries are desugared into
/// top-level intents scoped to this goal at registration time.
#[derive(Clone, Default)]
pub struct GoalDef {
    pub key: String,
    pub resolve: Option<Resolver>,
    pub prompt: Option<Phrase>,
    pub ask: Option<Phrase>,
    pub respond_to: Vec<IntentDef>,
}

impl GoalDef {
    pub fn resolver_goal(key: impl Into<String>, resolve: Resolver) -> Self {
        Self {
            key: key.into(),
            resolve: Some(resolve),
            ..Self::default()
        }
    }

    pub fn query(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<Phrase>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_ask(mut self, ask: impl Into<Phrase>) -> Self {
        self.ask = Some(ask.into());
        self
    }

    pub fn with_respond_to(mut self, def: IntentDef) -> Self {
        self.respond_to.push(def);
        self
    }
}

impl fmt::Debug for GoalDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoalDef")
            .field("key", &self.key)
            .field("has_resolve", &self.resolve.is_some())
            .field("prompt", &self.prompt)
            .field("ask", &self.ask)
            .finish_non_exhaustive()
    }
}
