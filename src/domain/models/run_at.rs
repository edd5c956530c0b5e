//! `run_at` schedule expression — spec.md §4.5.
//!
//! Covers the four documented forms: `@every <interval>`,
//! `@after <interval>`, named aliases / 5-field cron expressions
//! (delegated to the `cron` crate), and `@reboot`.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunAt {
    /// Fires every `interval` since the scheduler process started.
    Every { interval_secs: u64 },
    /// Fires once, `interval` after the previous run's *completion*
    /// (spec.md §9 Open Question — resolved against completion, see
    /// DESIGN.md).
    After { interval_secs: u64 },
    /// A 5-field cron expression or named alias (`@hourly`, `@daily`, …),
    /// evaluated by the `cron` crate.
    Cron { expression: String },
    /// Fires exactly once, at process start.
    Reboot,
}

impl RunAt {
    /// Parse the textual forms documented in spec.md §4.5.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("@every ") {
            let secs = parse_interval(rest)?;
            return Ok(Self::Every { interval_secs: secs });
        }
        if let Some(rest) = raw.strip_prefix("@after ") {
            let secs = parse_interval(rest)?;
            return Ok(Self::After { interval_secs: secs });
        }
        if raw == "@reboot" {
            return Ok(Self::Reboot);
        }
        // Named aliases and 5-field expressions are both accepted by
        // the `cron` crate once normalized to its 6/7-field form.
        Self::validate_cron(raw)?;
        Ok(Self::Cron { expression: raw.to_string() })
    }

    fn validate_cron(expression: &str) -> Result<(), DomainError> {
        Self::to_cron_schedule(expression).map(|_| ())
    }

    /// `cron` crate schedules are 6- or 7-field (seconds-first, optional
    /// year); spec.md documents standard 5-field expressions, so a
    /// leading `0` seconds field is prepended unless it is a named
    /// alias (those are accepted by the crate as-is).
    fn to_cron_schedule(expression: &str) -> Result<Schedule, DomainError> {
        if expression.starts_with('@') {
            return Schedule::from_str(expression)
                .map_err(|e| DomainError::ValidationFailed(format!("invalid cron alias: {e}")));
        }
        let fields = expression.split_whitespace().count();
        let normalized = if fields == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };
        Schedule::from_str(&normalized)
            .map_err(|e| DomainError::ValidationFailed(format!("invalid cron expression: {e}")))
    }

    /// Compute the next fire time given the process start time and,
    /// for `@after`, the previous completion time.
    pub fn next_fire_after(
        &self,
        now: DateTime<Utc>,
        process_started_at: DateTime<Utc>,
        last_completed_at: Option<DateTime<Utc>>,
        already_fired_once: bool,
    ) -> Option<DateTime<Utc>> {
        match self {
            Self::Every { interval_secs } => {
                let interval = Duration::from_secs(*interval_secs);
                let mut next = process_started_at;
                while next <= now {
                    next += chrono::Duration::from_std(interval).ok()?;
                }
                Some(next)
            }
            Self::After { interval_secs } => {
                if already_fired_once {
                    return None;
                }
                let base = last_completed_at.unwrap_or(process_started_at);
                Some(base + chrono::Duration::seconds(*interval_secs as i64))
            }
            Self::Cron { expression } => Self::to_cron_schedule(expression)
                .ok()
                .and_then(|schedule| schedule.after(&now).next()),
            Self::Reboot => {
                if already_fired_once {
                    None
                } else {
                    Some(process_started_at)
                }
            }
        }
    }

    /// Whether this schedule fires more than once (everything except
    /// `@after` and `@reboot`, which are one-shot per process lifetime).
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::After { .. } | Self::Reboot)
    }
}

fn parse_interval(raw: &str) -> Result<u64, DomainError> {
    let raw = raw.trim();
    let (digits, unit) = raw
        .find(|c: char| !c.is_ascii_digit())
        .map(|idx| raw.split_at(idx))
        .unwrap_or((raw, "s"));
    let value: u64 = digits
        .parse()
        .map_err(|_| DomainError::ValidationFailed(format!("invalid interval: {raw}")))?;
    let multiplier = match unit.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86_400,
        _ => {
            return Err(DomainError::ValidationFailed(format!(
                "unknown interval unit in {raw:?}"
            )))
        }
    };
    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_interval() {
        let run_at = RunAt::parse("@every 5m").unwrap();
        assert!(matches!(run_at, RunAt::Every { interval_secs: 300 }));
    }

    #[test]
    fn parses_after_interval() {
        let run_at = RunAt::parse("@after 30s").unwrap();
        assert!(matches!(run_at, RunAt::After { interval_secs: 30 }));
    }

    #[test]
    fn parses_reboot() {
        assert!(matches!(RunAt::parse("@reboot").unwrap(), RunAt::Reboot));
    }

    #[test]
    fn parses_five_field_cron() {
        let run_at = RunAt::parse("*/5 * * * *").unwrap();
        assert!(matches!(run_at, RunAt::Cron { .. }));
    }

    #[test]
    fn parses_named_alias() {
        let run_at = RunAt::parse("@hourly").unwrap();
        assert!(matches!(run_at, RunAt::Cron { .. }));
    }

    #[test]
    fn rejects_garbage_cron() {
        assert!(RunAt::parse("not a schedule").is_err());
    }
}
