//! Declarative form validation.
//!
//! Each form has a `Ruleset`: an ordered list of fields, each with an
//! ordered list of rules. Validation stops at the first failing rule for a
//! field and reports its message. Rules other than the "required" family
//! pass on an empty value, so optional fields only get checked when filled.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Field names shared by the forms
pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const PASSWORD_CONFIRM: &str = "password_confirm";
    pub const OLD_PASSWORD: &str = "old_password";
}

/// Minimum password length accepted by the API
pub const MIN_PASSWORD_LENGTH: usize = 6;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

/// A single check applied to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Value must be non-blank
    Required,
    /// Value must be non-blank when the named field is filled
    RequiredWith(&'static str),
    /// Value must look like an email address
    Email,
    /// Value must have at least this many characters
    MinLength(usize),
    /// Value must equal the named field
    EqualsField(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub check: Check,
    pub message: &'static str,
}

impl Rule {
    pub const fn new(check: Check, message: &'static str) -> Self {
        Self { check, message }
    }

    fn passes(&self, value: &str, values: &FormValues) -> bool {
        let blank = value.trim().is_empty();
        match self.check {
            Check::Required => !blank,
            Check::RequiredWith(other) => !blank || values.get(other).trim().is_empty(),
            _ if blank => true,
            Check::Email => email_pattern().is_match(value.trim()),
            Check::MinLength(min) => value.chars().count() >= min,
            Check::EqualsField(other) => value == values.get(other),
        }
    }
}

/// Submitted form input, keyed by field name. Missing fields read as empty.
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    values: BTreeMap<String, String>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }
}

/// Field name → message of the first rule that field failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.summary())]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn summary(&self) -> String {
        self.errors
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    fields: Vec<(&'static str, Vec<Rule>)>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rules: Vec<Rule>) -> Self {
        self.fields.push((name, rules));
        self
    }

    pub fn validate(&self, values: &FormValues) -> Result<(), ValidationErrors> {
        let mut errors = BTreeMap::new();
        for (field, rules) in &self.fields {
            let value = values.get(field);
            if let Some(rule) = rules.iter().find(|r| !r.passes(value, values)) {
                errors.insert(field.to_string(), rule.message.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { errors })
        }
    }
}

// ============================================================================
// Form rulesets
// ============================================================================

pub fn sign_in_rules() -> Ruleset {
    Ruleset::new()
        .field(
            fields::EMAIL,
            vec![
                Rule::new(Check::Required, "Enter your email"),
                Rule::new(Check::Email, "Invalid email"),
            ],
        )
        .field(
            fields::PASSWORD,
            vec![Rule::new(Check::Required, "Enter your password")],
        )
}

pub fn sign_up_rules() -> Ruleset {
    Ruleset::new()
        .field(fields::NAME, vec![Rule::new(Check::Required, "Enter your name")])
        .field(
            fields::EMAIL,
            vec![
                Rule::new(Check::Required, "Enter your email"),
                Rule::new(Check::Email, "Invalid email"),
            ],
        )
        .field(
            fields::PASSWORD,
            vec![
                Rule::new(Check::Required, "Enter a password"),
                Rule::new(
                    Check::MinLength(MIN_PASSWORD_LENGTH),
                    "Password must have at least 6 characters",
                ),
            ],
        )
        .field(
            fields::PASSWORD_CONFIRM,
            vec![
                Rule::new(Check::Required, "Confirm your password"),
                Rule::new(Check::EqualsField(fields::PASSWORD), "Passwords do not match"),
            ],
        )
}

pub fn profile_rules() -> Ruleset {
    Ruleset::new()
        .field(fields::NAME, vec![Rule::new(Check::Required, "Enter your name")])
        .field(
            fields::OLD_PASSWORD,
            vec![Rule::new(
                Check::RequiredWith(fields::PASSWORD),
                "Enter your current password",
            )],
        )
        .field(
            fields::PASSWORD,
            vec![Rule::new(
                Check::MinLength(MIN_PASSWORD_LENGTH),
                "Password must have at least 6 characters",
            )],
        )
        .field(
            fields::PASSWORD_CONFIRM,
            vec![
                Rule::new(Check::RequiredWith(fields::PASSWORD), "Confirm your new password"),
                Rule::new(Check::EqualsField(fields::PASSWORD), "Passwords do not match"),
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_requires_both_fields() {
        let errors = sign_in_rules().validate(&FormValues::new()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(fields::EMAIL), Some("Enter your email"));
        assert_eq!(errors.get(fields::PASSWORD), Some("Enter your password"));
    }

    #[test]
    fn test_sign_in_rejects_malformed_email() {
        let values = FormValues::new()
            .with(fields::EMAIL, "not-an-email")
            .with(fields::PASSWORD, "secret");
        let errors = sign_in_rules().validate(&values).unwrap_err();
        assert_eq!(errors.get(fields::EMAIL), Some("Invalid email"));
        assert_eq!(errors.get(fields::PASSWORD), None);
    }

    #[test]
    fn test_sign_in_accepts_valid_input() {
        let values = FormValues::new()
            .with(fields::EMAIL, "a@b.com")
            .with(fields::PASSWORD, "secret");
        assert!(sign_in_rules().validate(&values).is_ok());
    }

    #[test]
    fn test_sign_up_password_rules() {
        let values = FormValues::new()
            .with(fields::NAME, "Ana")
            .with(fields::EMAIL, "ana@example.com")
            .with(fields::PASSWORD, "123")
            .with(fields::PASSWORD_CONFIRM, "1234");
        let errors = sign_up_rules().validate(&values).unwrap_err();
        assert_eq!(
            errors.get(fields::PASSWORD),
            Some("Password must have at least 6 characters")
        );
        assert_eq!(errors.get(fields::PASSWORD_CONFIRM), Some("Passwords do not match"));
    }

    #[test]
    fn test_profile_without_password_change() {
        let values = FormValues::new().with(fields::NAME, "Ana");
        assert!(profile_rules().validate(&values).is_ok());
    }

    #[test]
    fn test_profile_password_change_needs_old_password_and_confirmation() {
        let values = FormValues::new()
            .with(fields::NAME, "Ana")
            .with(fields::PASSWORD, "newsecret");
        let errors = profile_rules().validate(&values).unwrap_err();
        assert_eq!(errors.get(fields::OLD_PASSWORD), Some("Enter your current password"));
        assert_eq!(errors.get(fields::PASSWORD_CONFIRM), Some("Confirm your new password"));

        let values = values
            .with(fields::OLD_PASSWORD, "oldsecret")
            .with(fields::PASSWORD_CONFIRM, "newsecret");
        assert!(profile_rules().validate(&values).is_ok());
    }

    #[test]
    fn test_first_failing_rule_wins() {
        // Blank email fails Required, not Email
        let values = FormValues::new().with(fields::EMAIL, "   ");
        let errors = sign_in_rules().validate(&values).unwrap_err();
        assert_eq!(errors.get(fields::EMAIL), Some("Enter your email"));
    }

    #[test]
    fn test_errors_display_joins_messages() {
        let errors = sign_in_rules().validate(&FormValues::new()).unwrap_err();
        assert_eq!(errors.to_string(), "Enter your email; Enter your password");
    }
}
