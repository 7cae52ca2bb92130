//! Declarative request validation
//!
//! Each request type publishes a rule table (`Validate::RULES`). The
//! `Validator` runs every rule, collects every violation, and only then runs
//! the type's cross-field check.

pub mod rules;

use crate::clock::Clock;
use crate::error::{FieldViolation, ValidationError};
use chrono::NaiveDate;

/// A field value as seen by the rule runner.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Date(Option<NaiveDate>),
}

impl FieldValue {
    /// Zero values mean "not provided".
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Int(n) => *n == 0,
            FieldValue::Date(d) => d.is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    OneOf(&'static [&'static str]),
    PastDate,
    MinValue(i64),
    Phone,
    Email,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::OneOf(_) => "one_of",
            Rule::PastDate => "past_date",
            Rule::MinValue(_) => "min_value",
            Rule::Phone => "phone",
            Rule::Email => "email",
        }
    }
}

/// One row of a rule table: which field, how to read it, what to check.
pub struct FieldRule<T> {
    pub field: &'static str,
    pub value: fn(&T) -> FieldValue,
    pub rule: Rule,
}

/// Implemented by every request payload.
pub trait Validate: Sized + 'static {
    /// Machine-readable code used when field rules fail.
    const ERROR_CODE: &'static str;
    const RULES: &'static [FieldRule<Self>];

    /// Checks spanning several fields, run only when all field rules pass.
    fn cross_field(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Rule runner shared by all services.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    clock: Clock,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn validate<T: Validate>(&self, request: &T) -> Result<(), ValidationError> {
        let now = self.clock.now();
        let mut violations = Vec::new();

        for field_rule in T::RULES {
            let value = (field_rule.value)(request);
            if let Some(message) = rules::check(field_rule.rule, field_rule.field, &value, now) {
                violations.push(FieldViolation {
                    field: field_rule.field,
                    rule: field_rule.rule.name(),
                    message,
                });
            }
        }

        if !violations.is_empty() {
            return Err(
                ValidationError::new(T::ERROR_CODE, "Validation errors occurred")
                    .with_details(violations),
            );
        }

        request.cross_field(now.date_naive())
    }
}
