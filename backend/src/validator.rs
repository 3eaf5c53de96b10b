use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Email address pattern (the WHATWG `input[type=email]` grammar).
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

/// Validator
///
/// Accumulates validation failures for one submitted form. Only the first failure recorded
/// for a field is kept. Non-field errors are kept separately and do not affect `valid()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    field_errors: HashMap<String, String>,
    non_field_errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field errors have been recorded.
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn add_field_error(&mut self, key: &str, message: &str) {
        self.field_errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    /// Records `message` under `key` when `ok` is false.
    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }

    pub fn field_error(&self, key: &str) -> Option<&str> {
        self.field_errors.get(key).map(String::as_str)
    }

    pub fn field_errors(&self) -> &HashMap<String, String> {
        &self.field_errors
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }
}

/// True if the value contains anything other than whitespace.
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// True if the value has at most `limit` characters (Unicode scalar values).
pub fn max_chars(value: &str, limit: usize) -> bool {
    value.chars().count() <= limit
}

/// True if the value has at least `limit` characters (Unicode scalar values).
pub fn min_chars(value: &str, limit: usize) -> bool {
    value.chars().count() >= limit
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}
