pub mod codec;
pub mod goal_stack;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use goal_stack::{GoalFrame, GoalStack};

/// Reserved session slot holding the encoded goal stack.
pub const GOAL_STATE_SLOT: &str = "convoGoalState";

/// Key/value scope the platform carries across the turns of one
/// conversation. Request slot values are copied in before dispatch and
/// the whole map is written back to the platform at turn end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    values: BTreeMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn into_attributes(self) -> BTreeMap<String, String> {
        self.values
    }
}
