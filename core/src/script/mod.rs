pub mod numbers;
pub mod parser;
pub mod types;

pub use parser::{CompiledUtterances, compile_utterances, extract_slots};
pub use types::{PhraseEquivalents, SlotType};
