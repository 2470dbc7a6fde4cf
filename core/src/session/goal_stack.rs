use serde::{Deserialize, Serialize};

use crate::session::{
    GOAL_STATE_SLOT, Session,
    codec::{self, FlagRecord},
};

const QUERIED_FLAG: &str = "queried";

/// One live instance of a goal on the stack. `queried` is set after the
/// goal's prompt or ask has been spoken; resolver goals never set it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalFrame {
    pub key: String,
    #[serde(default)]
    pub queried: bool,
}

impl GoalFrame {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            queried: false,
        }
    }
}

impl From<&GoalFrame> for FlagRecord {
    fn from(frame: &GoalFrame) -> Self {
        if frame.queried {
            FlagRecord::with_flag(frame.key.clone(), QUERIED_FLAG)
        } else {
            FlagRecord::new(frame.key.clone())
        }
    }
}

impl From<FlagRecord> for GoalFrame {
    fn from(record: FlagRecord) -> Self {
        let queried = record.has_flag(QUERIED_FLAG);
        Self {
            key: record.key,
            queried,
        }
    }
}

/// LIFO of goal frames persisted in the `convoGoalState` session slot.
/// The same key may appear more than once; the top is the most recently
/// appended frame, and removal drops the first (leftmost) occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalStack {
    frames: Vec<GoalFrame>,
}

impl GoalStack {
    pub fn load(session: &Session) -> Self {
        let encoded = session.get(GOAL_STATE_SLOT).unwrap_or_default();
        let frames = codec::decode(encoded)
            .into_iter()
            .map(GoalFrame::from)
            .collect();
        Self { frames }
    }

    /// Re-serializes the whole stack into its session slot.
    pub fn save(&self, session: &mut Session) {
        let records: Vec<FlagRecord> = self.frames.iter().map(FlagRecord::from).collect();
        session.set(GOAL_STATE_SLOT, codec::encode(&records));
    }

    pub fn frames(&self) -> &[GoalFrame] {
        &self.frames
    }

    pub fn names(&self) -> Vec<&str> {
        self.frames.iter().map(|frame| frame.key.as_str()).collect()
    }

    pub fn set(&mut self, frames: Vec<GoalFrame>) {
        self.frames = frames;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn append(&mut self, key: impl Into<String>) {
        self.frames.push(GoalFrame::new(key));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.frames.iter().any(|frame| frame.key == key)
    }

    /// Removes the leftmost frame with this key. Returns false when the
    /// key is not on the stack.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.frames.iter().position(|frame| frame.key == key) {
            Some(index) => {
                self.frames.remove(index);
                true
            }
            None => false,
        }
    }

    /// Depth 0 is the most recently appended frame.
    pub fn top(&self, depth: usize) -> Option<&GoalFrame> {
        let len = self.frames.len();
        if depth < len {
            self.frames.get(len - 1 - depth)
        } else {
            None
        }
    }

    pub fn update_at(&mut self, depth: usize, frame: GoalFrame) {
        let len = self.frames.len();
        if depth < len {
            self.frames[len - 1 - depth] = frame;
        }
    }
}
