//! Column operations.
//!
//! The fixed set of rewrites a user can apply to the ID or phone column.
//! Each operation maps one cell value to a new value and never looks at
//! other rows.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::checksum::compute_check_digit;
use crate::error::{ChecksumError, TransformError};
use crate::models::Target;

/// Country prefix added by [`Operation::PrefixPlusSeven`].
pub const PHONE_PREFIX: &str = "+7";

/// All available column operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Prepend `+7`
    PrefixPlusSeven,

    /// Drop the first character (empty values stay empty)
    TrimLeftOne,

    /// Drop the last character (empty values stay empty)
    TrimRightOne,

    /// Remove every character that is not `0-9`
    StripNonDigits,

    /// Append the Luhn check digit of the value's digits
    AppendCheckDigit,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::PrefixPlusSeven,
        Operation::TrimLeftOne,
        Operation::TrimRightOne,
        Operation::StripNonDigits,
        Operation::AppendCheckDigit,
    ];

    /// Apply this operation to a value
    pub fn apply(&self, value: &str) -> Result<String, ChecksumError> {
        match self {
            Operation::PrefixPlusSeven => Ok(format!("{}{}", PHONE_PREFIX, value)),
            Operation::TrimLeftOne => Ok(Self::apply_trim_left(value)),
            Operation::TrimRightOne => Ok(Self::apply_trim_right(value)),
            Operation::StripNonDigits => Ok(Self::apply_strip_non_digits(value)),
            Operation::AppendCheckDigit => Self::apply_append_check_digit(value),
        }
    }

    fn apply_trim_left(value: &str) -> String {
        let mut chars = value.chars();
        chars.next();
        chars.as_str().to_string()
    }

    fn apply_trim_right(value: &str) -> String {
        let mut chars = value.chars();
        chars.next_back();
        chars.as_str().to_string()
    }

    fn apply_strip_non_digits(value: &str) -> String {
        value.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    fn apply_append_check_digit(value: &str) -> Result<String, ChecksumError> {
        let digits = Self::apply_strip_non_digits(value);
        let check = compute_check_digit(&digits)?;
        Ok(format!("{}{}", value, check))
    }

    /// Kebab-case name used in the CLI, API and descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::PrefixPlusSeven => "prefix-plus-seven",
            Operation::TrimLeftOne => "trim-left-one",
            Operation::TrimRightOne => "trim-right-one",
            Operation::StripNonDigits => "strip-non-digits",
            Operation::AppendCheckDigit => "append-check-digit",
        }
    }

    /// One-line human description.
    pub fn description(&self) -> &'static str {
        match self {
            Operation::PrefixPlusSeven => "Prepend \"+7\" to the value",
            Operation::TrimLeftOne => "Remove the first character",
            Operation::TrimRightOne => "Remove the last character",
            Operation::StripNonDigits => "Keep only the digits 0-9",
            Operation::AppendCheckDigit => "Append the Luhn check digit of the value's digits",
        }
    }

    /// Column the operation is meant for when no target is given.
    pub fn default_target(&self) -> Target {
        match self {
            Operation::PrefixPlusSeven => Target::Phone,
            _ => Target::Id,
        }
    }

    /// Whether applying twice gives the same result as applying once.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Operation::StripNonDigits)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == wanted)
            .ok_or_else(|| TransformError::UnknownOperation(s.to_string()))
    }
}

// =============================================================================
// Steps
// =============================================================================

static STEP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?P<target>[A-Za-z]+)\s*:)?\s*(?P<op>[A-Za-z_-]+)\s*$")
        .expect("step pattern is valid")
});

/// An operation bound to one of the selected columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub target: Target,
    pub operation: Operation,
}

impl Step {
    pub fn new(target: Target, operation: Operation) -> Self {
        Self { target, operation }
    }
}

impl From<Operation> for Step {
    fn from(operation: Operation) -> Self {
        Step::new(operation.default_target(), operation)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.operation)
    }
}

/// Parses `target:operation` or a bare `operation`.
impl FromStr for Step {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = STEP_RE
            .captures(s)
            .ok_or_else(|| TransformError::UnknownOperation(s.to_string()))?;

        let operation: Operation = caps["op"].parse()?;
        match caps.name("target") {
            Some(t) => Ok(Step::new(t.as_str().parse()?, operation)),
            None => Ok(Step::from(operation)),
        }
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    let mut out = String::from("Available operations:\n\n");
    out.push_str("| Operation | Default column | Description |\n");
    out.push_str("|-----------|----------------|-------------|\n");
    for op in Operation::ALL {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            op.name(),
            op.default_target(),
            op.description()
        ));
    }
    out.push_str(
        "\nSteps are written `target:operation` (e.g. `id:append-check-digit`)\n\
         or just `operation` to use its default column.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_plus_seven() {
        let op = Operation::PrefixPlusSeven;
        assert_eq!(op.apply("9161234567").unwrap(), "+79161234567");
        assert_eq!(op.apply("").unwrap(), "+7");
    }

    #[test]
    fn test_trims() {
        assert_eq!(Operation::TrimLeftOne.apply("123456").unwrap(), "23456");
        assert_eq!(Operation::TrimRightOne.apply("123456").unwrap(), "12345");
    }

    #[test]
    fn test_trims_on_empty_are_noops() {
        assert_eq!(Operation::TrimLeftOne.apply("").unwrap(), "");
        assert_eq!(Operation::TrimRightOne.apply("").unwrap(), "");
    }

    #[test]
    fn test_trims_work_on_characters() {
        assert_eq!(Operation::TrimLeftOne.apply("№123").unwrap(), "123");
        assert_eq!(Operation::TrimRightOne.apply("123ё").unwrap(), "123");
    }

    #[test]
    fn test_strip_non_digits() {
        let op = Operation::StripNonDigits;
        assert_eq!(op.apply("+7 (916) 123-45-67").unwrap(), "79161234567");
        assert_eq!(op.apply("abc").unwrap(), "");
    }

    #[test]
    fn test_append_check_digit_keeps_original_value() {
        let op = Operation::AppendCheckDigit;
        assert_eq!(op.apply("7992739871").unwrap(), "79927398713");
        assert_eq!(op.apply("7992-7398-71").unwrap(), "7992-7398-713");
    }

    #[test]
    fn test_append_check_digit_twice() {
        let op = Operation::AppendCheckDigit;
        let once = op.apply("7992739871").unwrap();
        let twice = op.apply(&once).unwrap();
        // Second pass treats the appended 3 as part of the body.
        assert_eq!(once, "79927398713");
        assert_eq!(twice, "799273987138");
    }

    #[test]
    fn test_append_check_digit_without_digits_fails() {
        let op = Operation::AppendCheckDigit;
        assert_eq!(op.apply("abc"), Err(ChecksumError::Empty));
        assert_eq!(op.apply(""), Err(ChecksumError::Empty));
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.name()));
        }
        assert_eq!(
            "strip_non_digits".parse::<Operation>().unwrap(),
            Operation::StripNonDigits
        );
        assert!("reverse".parse::<Operation>().is_err());
    }

    #[test]
    fn test_idempotence_flags() {
        assert!(Operation::StripNonDigits.is_idempotent());
        assert!(!Operation::AppendCheckDigit.is_idempotent());
        assert!(!Operation::PrefixPlusSeven.is_idempotent());
    }

    #[test]
    fn test_step_parsing() {
        assert_eq!(
            "id:append-check-digit".parse::<Step>().unwrap(),
            Step::new(Target::Id, Operation::AppendCheckDigit)
        );
        assert_eq!(
            "phone:strip-non-digits".parse::<Step>().unwrap(),
            Step::new(Target::Phone, Operation::StripNonDigits)
        );
        assert_eq!(
            "prefix-plus-seven".parse::<Step>().unwrap(),
            Step::new(Target::Phone, Operation::PrefixPlusSeven)
        );
        assert_eq!(
            "trim-left-one".parse::<Step>().unwrap(),
            Step::new(Target::Id, Operation::TrimLeftOne)
        );
        assert!(matches!(
            "email:trim-left-one".parse::<Step>(),
            Err(TransformError::UnknownTarget(_))
        ));
        assert!("id:".parse::<Step>().is_err());
    }

    #[test]
    fn test_step_display() {
        let step = Step::new(Target::Phone, Operation::PrefixPlusSeven);
        assert_eq!(step.to_string(), "phone:prefix-plus-seven");
        assert_eq!(step.to_string().parse::<Step>().unwrap(), step);
    }

    #[test]
    fn test_description_lists_all_operations() {
        let text = operations_description();
        for op in Operation::ALL {
            assert!(text.contains(op.name()));
        }
    }

    proptest! {
        #[test]
        fn strip_non_digits_is_idempotent(s in "\\PC*") {
            let op = Operation::StripNonDigits;
            let once = op.apply(&s).unwrap();
            prop_assert_eq!(op.apply(&once).unwrap(), once);
        }
    }
}
