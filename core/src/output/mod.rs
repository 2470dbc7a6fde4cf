use rand::{Rng, rngs::StdRng};
use regex::Regex;

/// SSML pause inserted between statements and before a question.
pub const BREAK_500MS: &str = r#"<break time="500ms"/>"#;

/// A spoken fragment: either a fixed string or a list to pick from
/// uniformly at random.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phrase {
    One(String),
    AnyOf(Vec<String>),
}

impl From<&str> for Phrase {
    fn from(text: &str) -> Self {
        Self::One(text.to_string())
    }
}

impl From<String> for Phrase {
    fn from(text: String) -> Self {
        Self::One(text)
    }
}

impl From<Vec<String>> for Phrase {
    fn from(options: Vec<String>) -> Self {
        Self::AnyOf(options)
    }
}

impl From<Vec<&str>> for Phrase {
    fn from(options: Vec<&str>) -> Self {
        Self::AnyOf(options.into_iter().map(str::to_string).collect())
    }
}

/// Lookup source for `{{var}}` interpolation at say-time.
pub trait VariableSource {
    fn resolve_var(&self, name: &str) -> Option<String>;
}

/// Accumulates the turn's say and ask buffers and composes the single
/// spoken response handed back to the platform.
pub struct OutputManager {
    say_parts: Vec<String>,
    ask_parts: Vec<String>,
    asked: f32,
    spoken_rate: Option<String>,
    close_requested: bool,
    rng: StdRng,
}

/// Weight of a `prompt` toward the one-question budget: three prompts
/// count as one question.
const PROMPT_WEIGHT: f32 = 0.34;

impl OutputManager {
    pub fn new(spoken_rate: Option<String>, rng: StdRng) -> Self {
        Self {
            say_parts: Vec::new(),
            ask_parts: Vec::new(),
            asked: 0.0,
            spoken_rate,
            close_requested: false,
            rng,
        }
    }

    /// Queues a statement. Sequential statements are separated by a
    /// 500 ms pause unless `quick` is set.
    pub fn say(&mut self, phrase: &Phrase, quick: bool, vars: &dyn VariableSource) {
        let text = self.pick_and_interpolate(phrase, vars);
        if !self.say_parts.is_empty() && !quick {
            self.say_parts.push(BREAK_500MS.to_string());
        }
        self.say_parts.push(text);
    }

    pub fn prompt(&mut self, phrase: &Phrase, vars: &dyn VariableSource) {
        let text = self.pick_and_interpolate(phrase, vars);
        self.ask_parts.push(text);
        self.asked += PROMPT_WEIGHT;
    }

    pub fn ask(&mut self, phrase: &Phrase, vars: &dyn VariableSource) {
        let text = self.pick_and_interpolate(phrase, vars);
        self.ask_parts.push(text);
        self.asked += 1.0;
    }

    /// Accumulated question weight; the goal loop halts once this
    /// reaches 1.
    pub fn asked(&self) -> f32 {
        self.asked
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn is_empty(&self) -> bool {
        self.say_parts.is_empty() && self.ask_parts.is_empty()
    }

    /// Composes the spoken response: statements, then the question
    /// fragments joined `, `/` or ` behind one pause, with an optional
    /// prosody wrap. An empty composition emits no speech but the turn
    /// still closes cleanly.
    pub fn compose(&mut self) -> ComposedSpeech {
        let mut text = self.say_parts.join(" ");
        if !self.ask_parts.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(BREAK_500MS);
            text.push(' ');
            text.push_str(&join_question_fragments(&self.ask_parts));
        }

        let mut text = text.replace(" & ", " and ");
        if let Some(rate) = self.spoken_rate.as_ref()
            && !text.is_empty()
        {
            text = format!(r#"<prosody rate="{rate}">{text}</prosody>"#);
        }

        ComposedSpeech {
            text,
            end_session: self.close_requested,
        }
    }

    fn pick_and_interpolate(&mut self, phrase: &Phrase, vars: &dyn VariableSource) -> String {
        let picked = match phrase {
            Phrase::One(text) => text.clone(),
            Phrase::AnyOf(options) if options.is_empty() => String::new(),
            Phrase::AnyOf(options) => {
                let index = self.rng.gen_range(0..options.len());
                options[index].clone()
            }
        };
        interpolate(&picked, vars)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedSpeech {
    pub text: String,
    pub end_session: bool,
}

fn join_question_fragments(fragments: &[String]) -> String {
    match fragments {
        [] => String::new(),
        [single] => single.clone(),
        [head @ .., last] => format!("{} or {last}", head.join(", ")),
    }
}

fn interpolate(text: &str, vars: &dyn VariableSource) -> String {
    let matcher =
        Regex::new(r"\{\{([A-Za-z][A-Za-z0-9_.]*)\}\}").expect("interpolation pattern is valid");
    matcher
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let name = &captures[1];
            vars.resolve_var(name).unwrap_or_else(|| {
                tracing::warn!(target: "output", var = name, "unresolved_output_variable");
                String::new()
            })
        })
        .into_owned()
}
