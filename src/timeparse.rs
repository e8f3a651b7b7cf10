// Human lease-duration parsing
//
// Three grammars, tried in order: a clock time ("6pm", "6:30PM",
// "18:00"), relative hours ("24h", "1.5h"), relative days ("2d",
// "0.5d"). Clock times in the past roll forward one day so a lease
// requested at 11pm for "1am" spans midnight.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Local};
use regex::Regex;
use thiserror::Error;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?::([0-5]\d))?(AM|PM)?$").expect("invalid clock pattern"));

static HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)H$").expect("invalid hours pattern"));

static DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)D$").expect("invalid days pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("unknown time format: {0}")]
    InvalidTimeExpression(String),
}

/// Parse a lease expiration expression into an absolute timestamp.
/// Case-insensitive. Fails without side effects; the caller must abort
/// the whole request on error.
pub fn parse_expiration(
    text: &str,
    now: DateTime<Local>,
) -> Result<DateTime<Local>, TimeParseError> {
    let expr = text.trim().to_uppercase();
    let invalid = || TimeParseError::InvalidTimeExpression(text.to_string());

    if let Some(caps) = CLOCK_RE.captures(&expr) {
        let mut hour: u32 = caps[1].parse().map_err(|_| invalid())?;
        let minute: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| invalid())?
            .unwrap_or(0);
        match caps.get(3).map(|m| m.as_str()) {
            Some(meridiem) => {
                if !(1..=12).contains(&hour) {
                    return Err(invalid());
                }
                hour %= 12;
                if meridiem == "PM" {
                    hour += 12;
                }
            }
            None => {
                if hour > 23 {
                    return Err(invalid());
                }
            }
        }
        let naive = now
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(invalid)?;
        let mut expiration = naive.and_local_timezone(Local).earliest().ok_or_else(invalid)?;
        if expiration <= now {
            expiration += Duration::days(1);
        }
        return Ok(expiration);
    }

    if let Some(caps) = HOURS_RE.captures(&expr) {
        let hours: f64 = caps[1].parse().map_err(|_| invalid())?;
        return offset_from_now(now, hours * 3_600_000.0).ok_or_else(invalid);
    }

    if let Some(caps) = DAYS_RE.captures(&expr) {
        let days: f64 = caps[1].parse().map_err(|_| invalid())?;
        return offset_from_now(now, days * 86_400_000.0).ok_or_else(invalid);
    }

    Err(invalid())
}

/// Apply a relative offset with checked arithmetic. A duration that
/// does not fit the datetime range is rejected like any other bad
/// expression.
fn offset_from_now(now: DateTime<Local>, millis: f64) -> Option<DateTime<Local>> {
    if !millis.is_finite() {
        return None;
    }
    // The saturating cast is safe: a value near i64::MAX milliseconds
    // always fails checked_add_signed.
    now.checked_add_signed(Duration::milliseconds(millis.round() as i64))
}
