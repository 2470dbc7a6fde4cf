use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Platform type code used for slots whose type was never declared or
/// is free-form text.
pub const FREE_TEXT_TYPE_CODE: &str = "free_text";

/// Named type for a parameter extracted from user speech. Keys are
/// unique within an engine and the table is frozen once the intent
/// tables are compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotType {
    /// Mapped by the adapter onto a platform-native type.
    BuiltIn { platform_code: String },
    /// Finite value set; the values are registered with each platform
    /// separately from the utterance templates.
    CustomEnum { values: Vec<String> },
    /// Free-form text with sample values for training.
    FreeText { samples: Vec<String> },
}

impl SlotType {
    pub fn built_in(platform_code: impl Into<String>) -> Self {
        Self::BuiltIn {
            platform_code: platform_code.into(),
        }
    }

    pub fn custom_enum(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::CustomEnum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn free_text(samples: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::FreeText {
            samples: samples.into_iter().map(Into::into).collect(),
        }
    }

    /// The type code handed to platforms for a slot of this type.
    /// Custom enums resolve to their own registered name.
    pub fn platform_code(&self, key: &str) -> String {
        match self {
            Self::BuiltIn { platform_code } => platform_code.clone(),
            Self::CustomEnum { .. } => key.to_string(),
            Self::FreeText { .. } => FREE_TEXT_TYPE_CODE.to_string(),
        }
    }
}

pub type SlotTypeTable = BTreeMap<String, SlotType>;

/// Ordered collection of sets of mutually interchangeable phrases.
/// Phrases are stored lowercase; matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEquivalents {
    sets: Vec<Vec<String>>,
}

impl PhraseEquivalents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_set(&mut self, phrases: impl IntoIterator<Item = impl Into<String>>) {
        self.sets.push(
            phrases
                .into_iter()
                .map(|phrase| phrase.into().to_lowercase())
                .collect(),
        );
    }

    pub fn sets(&self) -> &[Vec<String>] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
