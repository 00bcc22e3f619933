//! Password and email format rules.
//!
//! There is exactly one evaluator, [`evaluate_password`]. The single-message
//! view ([`validate_password`]) and the itemised checklist
//! ([`password_feedback`]) are both derived from its output, so the two can
//! never disagree about what a strong password is.

use crate::constants::{MIN_PASSWORD_LENGTH, PASSWORD_SPECIAL_CHARACTERS};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single password strength rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Digit,
    SpecialCharacter,
}

impl PasswordRule {
    /// All rules in the order they are reported.
    pub const ALL: [PasswordRule; 4] = [
        PasswordRule::MinLength,
        PasswordRule::Uppercase,
        PasswordRule::Digit,
        PasswordRule::SpecialCharacter,
    ];

    /// Message shown when the rule is not satisfied.
    pub fn failure_message(&self) -> String {
        match self {
            Self::MinLength => {
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long")
            }
            Self::Uppercase => "Password must contain at least one uppercase letter".to_string(),
            Self::Digit => "Password must contain at least one number".to_string(),
            Self::SpecialCharacter => format!(
                "Password must contain at least one special character ({PASSWORD_SPECIAL_CHARACTERS})"
            ),
        }
    }

    fn is_satisfied_by(&self, password: &str) -> bool {
        match self {
            Self::MinLength => password.chars().count() >= MIN_PASSWORD_LENGTH,
            Self::Uppercase => password.chars().any(|c| c.is_uppercase()),
            Self::Digit => password.chars().any(|c| c.is_ascii_digit()),
            Self::SpecialCharacter => password
                .chars()
                .any(|c| PASSWORD_SPECIAL_CHARACTERS.contains(c)),
        }
    }
}

/// Outcome of one rule against one password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCheck {
    pub rule: PasswordRule,
    pub satisfied: bool,
}

/// Evaluate every rule against `password`.
pub fn evaluate_password(password: &str) -> Vec<PasswordCheck> {
    PasswordRule::ALL
        .iter()
        .map(|rule| PasswordCheck {
            rule: *rule,
            satisfied: rule.is_satisfied_by(password),
        })
        .collect()
}

/// Validate a password, reporting the first failing rule.
///
/// # Errors
/// Returns `Error::WeakPassword` carrying the first actionable message.
///
/// # Examples
///
/// ```
/// use campuskubo_core::password::validate_password;
///
/// assert!(validate_password("Passw0rd!").is_ok());
/// assert!(validate_password("short").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<()> {
    match evaluate_password(password).into_iter().find(|c| !c.satisfied) {
        Some(check) => Err(Error::WeakPassword(check.rule.failure_message())),
        None => Ok(()),
    }
}

/// Itemised view: the failure message of every unsatisfied rule.
pub fn password_feedback(password: &str) -> Vec<String> {
    evaluate_password(password)
        .into_iter()
        .filter(|c| !c.satisfied)
        .map(|c| c.rule.failure_message())
        .collect()
}

/// Trim and lowercase an email address.
///
/// All lookups and uniqueness checks run on the normalised form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check the email format (an `@` followed somewhere by a `.`).
///
/// Uniqueness is checked separately by the user repository.
///
/// # Errors
/// Returns `Error::InvalidEmail` when the format is rejected.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(Error::InvalidEmail("Email is required".to_string()));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::InvalidEmail("Email must contain '@'".to_string()));
    };

    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err(Error::InvalidEmail(format!("Invalid email format: {email}")));
    }

    Ok(())
}
