use super::{FieldValue, Rule};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// International format: optional `+`, leading 1-9, 2 to 15 ASCII digits in total.
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{1,14}$").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Evaluate one rule against one value. Returns the violation message, if any.
///
/// Every rule except `Required` passes on a zero value.
pub fn check(rule: Rule, field: &str, value: &FieldValue, now: DateTime<Utc>) -> Option<String> {
    if value.is_empty() {
        return match rule {
            Rule::Required => Some(format!("{} is required", field)),
            _ => None,
        };
    }

    let ok = match (rule, value) {
        (Rule::Required, _) => true,
        (Rule::OneOf(allowed), FieldValue::Text(s)) => allowed.contains(&s.as_str()),
        (Rule::PastDate, FieldValue::Date(Some(d))) => is_past(*d, now),
        (Rule::MinValue(min), FieldValue::Int(n)) => *n >= min,
        (Rule::Phone, FieldValue::Text(s)) => PHONE.is_match(s),
        (Rule::Email, FieldValue::Text(s)) => EMAIL.is_match(s),
        // A rule attached to a field of the wrong shape never passes.
        _ => false,
    };

    if ok {
        return None;
    }

    Some(match rule {
        Rule::Required => format!("{} is required", field),
        Rule::OneOf(allowed) => format!("{} must be one of [{}]", field, allowed.join(", ")),
        Rule::PastDate => format!("{} must be in the past", field),
        Rule::MinValue(min) => format!("{} must be at least {}", field, min),
        Rule::Phone => format!("{} must be an international phone number", field),
        Rule::Email => format!("{} must be a valid email address", field),
    })
}

/// A calendar date is "past" when its midnight (UTC) is strictly before now.
pub fn is_past(date: NaiveDate, now: DateTime<Utc>) -> bool {
    date.and_time(NaiveTime::MIN).and_utc() < now
}

/// Age in whole years on `today`, one less while this year's day-of-year has
/// not yet reached the birth day-of-year.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if today.ordinal() < date_of_birth.ordinal() {
        age -= 1;
    }
    age
}
