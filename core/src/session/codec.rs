use regex::Regex;

/// Compact flag-record encoding for the goal-state session slot.
///
/// Records are separated by `;`; a record is its key followed by the
/// flags that are set, separated by `:`. Flags that are absent are
/// false, so `checkIn:queried;bloodSugar` decodes to two records with
/// only the first one queried. The encoding round-trips exactly for
/// keys matching `[A-Za-z]+` and flags matching `[a-z]+`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRecord {
    pub key: String,
    pub flags: Vec<String>,
}

impl FlagRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            flags: Vec::new(),
        }
    }

    pub fn with_flag(key: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            flags: vec![flag.into()],
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|item| item == flag)
    }
}

pub fn encode(records: &[FlagRecord]) -> String {
    records
        .iter()
        .map(|record| {
            if record.flags.is_empty() {
                record.key.clone()
            } else {
                format!("{}:{}", record.key, record.flags.join(":"))
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

pub fn decode(text: &str) -> Vec<FlagRecord> {
    text.split(';')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut parts = segment.split(':').filter(|part| !part.is_empty());
            let key = parts.next().unwrap_or_default().to_string();
            let flags = parts.map(str::to_string).collect();
            FlagRecord { key, flags }
        })
        .filter(|record| !record.key.is_empty())
        .collect()
}

/// Appends a flagless record for `key` to an encoded string.
pub fn push(text: &str, key: &str) -> String {
    if text.is_empty() {
        key.to_string()
    } else {
        format!("{text};{key}")
    }
}

/// Whole-word containment check over the encoded string; a key never
/// matches inside another key or flag.
pub fn contains(text: &str, key: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(key));
    match Regex::new(&pattern) {
        Ok(matcher) => matcher.is_match(text),
        Err(_) => false,
    }
}

/// Removes the first `key(:flag)*` run and collapses the separators
/// around it. Records after the removed one keep their order.
pub fn remove_first(text: &str, key: &str) -> String {
    let mut removed = false;
    let kept: Vec<&str> = text
        .split(';')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            let segment_key = segment.split(':').next().unwrap_or_default();
            if !removed && segment_key == key {
                removed = true;
                false
            } else {
                true
            }
        })
        .collect();
    kept.join(";")
}
