use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::script::{
    numbers::spell_digit_run,
    types::{FREE_TEXT_TYPE_CODE, PhraseEquivalents, SlotType, SlotTypeTable},
};

/// Result of compiling an author utterance list into platform-ready
/// training templates plus the slot declarations they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledUtterances {
    pub utterances: Vec<String>,
    /// Slot name to platform type code.
    pub slots: BTreeMap<String, String>,
}

/// Runs the full left-to-right transform chain: punctuation strip,
/// digit spelling, slot rewrite, phrase-equivalent expansion, slot
/// extraction. Pure except for warnings on unknown slot names.
pub fn compile_utterances(
    raw: &[String],
    types: &SlotTypeTable,
    equivalents: &PhraseEquivalents,
) -> CompiledUtterances {
    let mut referenced = BTreeSet::new();
    let utterances: Vec<String> = raw
        .iter()
        .map(|utterance| strip_punctuation(utterance))
        .map(|utterance| spell_digit_runs(&utterance))
        .map(|utterance| rewrite_slots(&utterance, types, &mut referenced))
        .collect();
    let utterances = expand_equivalents(utterances, equivalents);

    let mut slots = extract_slots(&utterances, types);
    // Optional-word groups can scan like slot references; only names the
    // author actually wrote as [[name]] are declarations.
    slots.retain(|name, _| referenced.contains(name));

    CompiledUtterances { utterances, slots }
}

pub fn strip_punctuation(utterance: &str) -> String {
    utterance.replace([',', '?'], "")
}

pub fn spell_digit_runs(utterance: &str) -> String {
    let matcher = Regex::new(r"\d+").expect("digit pattern is valid");
    matcher
        .replace_all(utterance, |captures: &regex::Captures<'_>| {
            spell_digit_run(&captures[0])
        })
        .into_owned()
}

/// Rewrites `[[name]]` slot references into `{sampleVals|name}` groups:
/// `-` for built-in and custom-enum types (their values are registered
/// out of band), the `|`-joined sample list for free-text types. Names
/// without a registered type warn and coerce to free text.
pub fn rewrite_slots(
    utterance: &str,
    types: &SlotTypeTable,
    referenced: &mut BTreeSet<String>,
) -> String {
    let matcher = Regex::new(r"\[\[([A-Za-z][A-Za-z0-9_]*)\]\]").expect("slot pattern is valid");
    matcher
        .replace_all(utterance, |captures: &regex::Captures<'_>| {
            let name = &captures[1];
            referenced.insert(name.to_string());
            let samples = match types.get(name) {
                Some(SlotType::FreeText { samples }) if !samples.is_empty() => samples.join("|"),
                Some(_) => "-".to_string(),
                None => {
                    tracing::warn!(
                        target: "script",
                        slot = name,
                        "unknown_slot_type_defaulting_to_free_text"
                    );
                    "-".to_string()
                }
            };
            format!("{{{samples}|{name}}}")
        })
        .into_owned()
}

/// One-pass phrase-equivalent expansion. Each set walks every utterance
/// accumulated so far and, for each case-insensitive phrase match, emits
/// one variant per alternative substituted at the matched position.
/// Utterances generated by a set are not re-expanded within that set.
pub fn expand_equivalents(utterances: Vec<String>, equivalents: &PhraseEquivalents) -> Vec<String> {
    let mut expanded = utterances;
    for set in equivalents.sets() {
        let snapshot_len = expanded.len();
        for index in 0..snapshot_len {
            let utterance = expanded[index].clone();
            let lowered = utterance.to_lowercase();
            for phrase in set {
                let Some(position) = lowered.find(phrase.as_str()) else {
                    continue;
                };
                for alternative in set {
                    if alternative == phrase {
                        continue;
                    }
                    let mut variant = String::with_capacity(utterance.len());
                    variant.push_str(&utterance[..position]);
                    variant.push_str(alternative);
                    variant.push_str(&utterance[position + phrase.len()..]);
                    expanded.push(variant);
                }
            }
        }
    }
    expanded
}

/// Scans produced utterances for `|name}` slot segments and resolves
/// each name to its platform type code.
pub fn extract_slots(utterances: &[String], types: &SlotTypeTable) -> BTreeMap<String, String> {
    let matcher = Regex::new(r"\|([A-Za-z][A-Za-z0-9_]*)\}").expect("slot scan pattern is valid");
    let mut slots = BTreeMap::new();
    for utterance in utterances {
        for captures in matcher.captures_iter(utterance) {
            let name = captures[1].to_string();
            let code = types
                .get(&name)
                .map(|slot_type| slot_type.platform_code(&name))
                .unwrap_or_else(|| FREE_TEXT_TYPE_CODE.to_string());
            slots.insert(name, code);
        }
    }
    slots
}
