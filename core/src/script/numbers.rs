//! Spoken-English spelling of digit runs, so that platforms receive
//! words rather than digits in their training utterances.

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 4] = [
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

pub fn spell_number(value: u64) -> String {
    if value < 20 {
        return ONES[value as usize].to_string();
    }
    if value < 100 {
        let tens = TENS[(value / 10) as usize];
        let rest = value % 10;
        return if rest == 0 {
            tens.to_string()
        } else {
            format!("{tens} {}", ONES[rest as usize])
        };
    }
    if value < 1_000 {
        let hundreds = format!("{} hundred", ONES[(value / 100) as usize]);
        let rest = value % 100;
        return if rest == 0 {
            hundreds
        } else {
            format!("{hundreds} {}", spell_number(rest))
        };
    }
    for (scale, name) in SCALES {
        if value >= scale {
            let head = format!("{} {name}", spell_number(value / scale));
            let rest = value % scale;
            return if rest == 0 {
                head
            } else {
                format!("{head} {}", spell_number(rest))
            };
        }
    }
    // Unreachable for u64, but keeps the match total.
    value.to_string()
}

/// Spells a raw digit run. Runs too long to parse are spelled digit by
/// digit, which is how they would be read aloud.
pub fn spell_digit_run(digits: &str) -> String {
    match digits.parse::<u64>() {
        Ok(value) => spell_number(value),
        Err(_) => digits
            .chars()
            .filter_map(|ch| ch.to_digit(10))
            .map(|digit| ONES[digit as usize])
            .collect::<Vec<_>>()
            .join(" "),
    }
}
