//! Registration checks as an ordered pipeline of independent rules.
//!
//! Each rule looks at a candidate [`Registration`] and a read-only
//! [`UserDirectory`]; the first rule that fails decides the outcome. Nothing
//! here touches storage, so the same pipeline serves the web layer, the
//! account store and tests.

use crate::error::Error;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // text@text.text: exactly one '@', exactly one '.' after it, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s.]+@[^@\s.]+\.[^@\s.]+$").unwrap();
}

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A registration request before anything is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Lookups a rule may need about users that already exist.
pub trait UserDirectory {
    fn username_exists(&self, username: &str) -> bool;
    fn email_exists(&self, email: &str) -> bool;
}

/// Directory with no users, for checks that only look at the candidate.
pub struct EmptyDirectory;

impl UserDirectory for EmptyDirectory {
    fn username_exists(&self, _username: &str) -> bool {
        false
    }

    fn email_exists(&self, _email: &str) -> bool {
        false
    }
}

/// The first rule a registration broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: &'static str,
    pub message: String,
}

impl From<ValidationFailure> for Error {
    fn from(failure: ValidationFailure) -> Self {
        Error::Validation {
            field: failure.field,
            message: failure.message,
        }
    }
}

type Check = fn(&Registration, &dyn UserDirectory) -> bool;

/// One predicate with the message reported when it does not hold.
pub struct Rule {
    pub field: &'static str,
    pub message: &'static str,
    check: Check,
}

impl Rule {
    pub fn new(field: &'static str, message: &'static str, check: Check) -> Self {
        Rule {
            field,
            message,
            check,
        }
    }

    pub fn passes(&self, candidate: &Registration, directory: &dyn UserDirectory) -> bool {
        (self.check)(candidate, directory)
    }
}

/// An ordered list of rules.
pub struct RegistrationValidator {
    rules: Vec<Rule>,
}

impl RegistrationValidator {
    pub fn new(rules: Vec<Rule>) -> Self {
        RegistrationValidator { rules }
    }

    /// Username, email and password rules, in that order.
    pub fn standard() -> Self {
        let mut rules = username_rules();
        rules.extend(email_rules());
        rules.extend(password_rules());
        RegistrationValidator::new(rules)
    }

    /// Only the password rules; used when an existing user changes password.
    pub fn passwords() -> Self {
        RegistrationValidator::new(password_rules())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn validate(
        &self,
        candidate: &Registration,
        directory: &dyn UserDirectory,
    ) -> Result<(), ValidationFailure> {
        match self
            .rules
            .iter()
            .find(|rule| !rule.passes(candidate, directory))
        {
            Some(rule) => {
                info!(
                    "registration for `{}` rejected: {}",
                    candidate.username, rule.message
                );
                Err(ValidationFailure {
                    field: rule.field,
                    message: rule.message.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

fn username_rules() -> Vec<Rule> {
    vec![
        Rule::new("username", "Username is empty", |c, _| {
            !c.username.trim().is_empty()
        }),
        Rule::new("username", "User already exists", |c, dir| {
            !dir.username_exists(&c.username)
        }),
    ]
}

fn email_rules() -> Vec<Rule> {
    vec![
        Rule::new("email", "Email is empty", |c, _| !c.email.trim().is_empty()),
        Rule::new("email", "Email is already registered", |c, dir| {
            !dir.email_exists(&c.email)
        }),
        Rule::new("email", "Email does not include @ symbol", |c, _| {
            c.email.contains('@')
        }),
        Rule::new(
            "email",
            "Email does not follow text@text.text format",
            |c, _| EMAIL_REGEX.is_match(&c.email),
        ),
    ]
}

fn password_rules() -> Vec<Rule> {
    vec![
        Rule::new("password", "Password is empty", |c, _| !c.password.is_empty()),
        Rule::new("password", "Password is the same as username", |c, _| {
            c.password != c.username
        }),
        Rule::new("password", "Password is the same as email", |c, _| {
            c.password != c.email
        }),
        Rule::new("password", "Password is the same as first name", |c, _| {
            c.first_name.is_empty() || c.password != c.first_name
        }),
        Rule::new("password", "Password is the same as last name", |c, _| {
            c.last_name.is_empty() || c.password != c.last_name
        }),
        Rule::new(
            "password",
            "Password is not at least 8 characters long",
            |c, _| c.password.chars().count() >= MIN_PASSWORD_LEN,
        ),
    ]
}
