//! Local, syntactic validators for free-text steps.
//!
//! Validators never touch the network. A failed check is always recoverable:
//! the engine shows the step's error message and waits for another attempt.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Characters tolerated in phone numbers besides digits.
const PHONE_PUNCTUATION: &[char] = &[' ', '(', ')', '-', '+', '.'];

/// A pure predicate over raw user input.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Anything with at least one non-whitespace character.
    NonEmpty,
    /// At least `n` characters after trimming.
    MinLength(usize),
    /// Phone-like input: only digits once punctuation is stripped, with a
    /// digit count in `min..=max`.
    Digits { min: usize, max: usize },
    /// `local@domain.tld` shape.
    Email,
    /// Custom expression matched against the trimmed input.
    Pattern(Regex),
}

impl Validator {
    /// Validator for Brazilian phone numbers with area code (10 or 11 digits,
    /// optionally prefixed by the 55 country code).
    pub fn whatsapp() -> Self {
        Self::Digits { min: 10, max: 13 }
    }

    pub fn accepts(&self, raw: &str) -> bool {
        let input = raw.trim();
        match self {
            Self::NonEmpty => !input.is_empty(),
            Self::MinLength(n) => input.chars().count() >= *n,
            Self::Digits { min, max } => {
                let digits: String = input
                    .chars()
                    .filter(|c| !PHONE_PUNCTUATION.contains(c))
                    .collect();
                !digits.is_empty()
                    && digits.chars().all(|c| c.is_ascii_digit())
                    && (*min..=*max).contains(&digits.len())
            }
            Self::Email => EMAIL.is_match(input),
            Self::Pattern(re) => re.is_match(input),
        }
    }

    /// Short label used in script introspection.
    pub fn describe(&self) -> String {
        match self {
            Self::NonEmpty => "non_empty".to_string(),
            Self::MinLength(n) => format!("min_length:{n}"),
            Self::Digits { min, max } => format!("digits:{min}-{max}"),
            Self::Email => "email".to_string(),
            Self::Pattern(re) => format!("pattern:{}", re.as_str()),
        }
    }
}
