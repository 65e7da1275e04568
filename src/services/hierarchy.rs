//! Validation and derivation rules for the Run → Suite → Spec hierarchy.
//!
//! Everything here is pure. The ingestion service calls these before it
//! writes anything, so a rejected spec never reaches the store.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{IngestRunRequest, SpecPayload, SpecStatus, SuitePayload};

/// Descriptions that mean "no real name": hook placeholders emitted by test runners.
const EMPTY_NAME_MARKERS: &[&str] = &[
    "",
    "-",
    "undefined",
    "null",
    "before all hook",
    "after all hook",
    "\"before all\" hook",
    "\"after all\" hook",
];

/// Column widths of the tables these values land in, in characters.
pub const MAX_PROJECT_ID_LEN: usize = 255;
pub const MAX_RUN_ID_LEN: usize = 255;
pub const MAX_BRANCH_LEN: usize = 255;
pub const MAX_COMMIT_SHA_LEN: usize = 64;
pub const MAX_ENVIRONMENT_LEN: usize = 100;
pub const MAX_SUITE_NAME_LEN: usize = 500;
pub const MAX_SPEC_NAME_LEN: usize = 1000;

/// A spec payload that passed validation, with both time bounds resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSpec {
    pub status: SpecStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub retry_count: i32,
}

/// Resolved time window of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Resolved time window of a suite.
pub type SuiteWindow = RunWindow;

/// Parse an RFC 3339 timestamp, naming the offending field on failure.
pub fn parse_timestamp(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Validation(format!("Invalid {} '{}': {}", field, value, e)))
}

fn parse_optional(field: &str, value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(field, v)).transpose()
}

/// Milliseconds between `start` and `end`. Negative spans are rejected, never clamped.
pub fn derive_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<i64> {
    let duration = (end - start).num_milliseconds();
    if duration < 0 {
        return Err(AppError::Validation(format!(
            "End time {} precedes start time {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(duration)
}

/// Whether a description is one of the known empty-setup markers.
pub fn is_placeholder_name(description: &str) -> bool {
    let trimmed = description.trim();
    EMPTY_NAME_MARKERS
        .iter()
        .any(|marker| marker.eq_ignore_ascii_case(trimmed))
}

/// Display name for a spec execution, falling back to `"<suite> Setup/Teardown"`.
pub fn name_or_placeholder(description: Option<&str>, suite_name: &str) -> String {
    match description {
        Some(d) if !is_placeholder_name(d) => d.trim().to_string(),
        _ => format!("{} Setup/Teardown", suite_name),
    }
}

fn check_length(field: &str, value: &str, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(AppError::Validation(format!(
            "{} is {} characters long, at most {} allowed",
            field, len, max
        )));
    }
    Ok(())
}

fn non_negative_duration(field: &str, duration_ms: Option<i64>) -> AppResult<i64> {
    match duration_ms {
        Some(d) if d < 0 => Err(AppError::Validation(format!(
            "{} must not be negative, got {}",
            field, d
        ))),
        Some(d) => Ok(d),
        None => Ok(0),
    }
}

/// Move `from` by `duration_ms`, forward or backward, within chrono's date range.
fn shift_by(
    field: &str,
    from: DateTime<Utc>,
    duration_ms: i64,
    forward: bool,
) -> AppResult<DateTime<Utc>> {
    Duration::try_milliseconds(duration_ms)
        .and_then(|delta| {
            if forward {
                from.checked_add_signed(delta)
            } else {
                from.checked_sub_signed(delta)
            }
        })
        .ok_or_else(|| {
            AppError::Validation(format!(
                "{} of {} ms puts the time bound out of range",
                field, duration_ms
            ))
        })
}

/// Validate one spec and resolve its time bounds.
///
/// A single missing bound is filled from the reported duration (zero if absent).
pub fn validate_spec(spec: &SpecPayload) -> AppResult<ValidatedSpec> {
    let status = SpecStatus::parse(spec.status.trim()).ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid spec status '{}': expected passed, failed, skipped or pending",
            spec.status
        ))
    })?;

    if spec.retry_count < 0 {
        return Err(AppError::Validation(format!(
            "retry_count must not be negative, got {}",
            spec.retry_count
        )));
    }

    if let Some(description) = &spec.description {
        check_length("spec description", description.trim(), MAX_SPEC_NAME_LEN)?;
    }

    let start = parse_optional("spec start_time", spec.start_time.as_deref())?;
    let end = parse_optional("spec end_time", spec.end_time.as_deref())?;
    let reported = non_negative_duration("spec duration_ms", spec.duration_ms)?;

    let (start_time, end_time) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, shift_by("spec duration_ms", start, reported, true)?),
        (None, Some(end)) => (shift_by("spec duration_ms", end, reported, false)?, end),
        (None, None) => {
            return Err(AppError::Validation(
                "Spec has neither start_time nor end_time".to_string(),
            ));
        }
    };

    derive_duration(start_time, end_time)?;

    Ok(ValidatedSpec {
        status,
        start_time,
        end_time,
        retry_count: spec.retry_count,
    })
}

/// Structural validation of a whole ingestion request, run before any write.
pub fn validate_payload(request: &IngestRunRequest) -> AppResult<()> {
    if request.project_id.trim().is_empty() {
        return Err(AppError::Validation("project_id is required".to_string()));
    }
    if request.run_id.trim().is_empty() {
        return Err(AppError::Validation("run_id is required".to_string()));
    }

    check_length("project_id", request.project_id.trim(), MAX_PROJECT_ID_LEN)?;
    check_length("run_id", request.run_id.trim(), MAX_RUN_ID_LEN)?;
    let optional_fields = [
        ("branch", &request.branch, MAX_BRANCH_LEN),
        ("commit_sha", &request.commit_sha, MAX_COMMIT_SHA_LEN),
        ("environment", &request.environment, MAX_ENVIRONMENT_LEN),
    ];
    for (field, value, max) in optional_fields {
        if let Some(value) = value {
            check_length(field, value, max)?;
        }
    }

    non_negative_duration("duration_ms", request.duration_ms)?;

    let start = parse_optional("start_time", request.start_time.as_deref())?;
    let end = parse_optional("end_time", request.end_time.as_deref())?;
    if let (Some(start), Some(end)) = (start, end) {
        derive_duration(start, end)?;
    }

    for (index, suite) in request.suites.iter().enumerate() {
        if suite.name.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Suite at index {} has no name",
                index
            )));
        }
        check_length("suite name", suite.name.trim(), MAX_SUITE_NAME_LEN)?;
        parse_optional("suite start_time", suite.start_time.as_deref())?;
        parse_optional("suite end_time", suite.end_time.as_deref())?;
    }

    Ok(())
}

/// Resolve the run's time window. `now` is used when no bound is supplied.
///
/// An explicit duration wins over `end - start`.
pub fn resolve_run_window(request: &IngestRunRequest, now: DateTime<Utc>) -> AppResult<RunWindow> {
    let start = parse_optional("start_time", request.start_time.as_deref())?;
    let end_time = parse_optional("end_time", request.end_time.as_deref())?;
    let explicit = request.duration_ms;

    let start_time = match (start, end_time) {
        (Some(start), _) => start,
        (None, Some(end)) => shift_by(
            "duration_ms",
            end,
            non_negative_duration("duration_ms", explicit)?,
            false,
        )?,
        (None, None) => now,
    };

    let duration_ms = match (explicit, end_time) {
        (Some(d), _) => Some(non_negative_duration("duration_ms", Some(d))?),
        (None, Some(end)) => Some(derive_duration(start_time, end)?),
        (None, None) => None,
    };

    Ok(RunWindow {
        start_time,
        end_time,
        duration_ms,
    })
}

/// Resolve a suite's time window; a missing start defaults to the run's start.
pub fn resolve_suite_window(
    suite: &SuitePayload,
    run_start: DateTime<Utc>,
) -> AppResult<SuiteWindow> {
    let start_time =
        parse_optional("suite start_time", suite.start_time.as_deref())?.unwrap_or(run_start);
    let end_time = parse_optional("suite end_time", suite.end_time.as_deref())?;
    let duration_ms = end_time
        .map(|end| derive_duration(start_time, end))
        .transpose()?;

    Ok(SuiteWindow {
        start_time,
        end_time,
        duration_ms,
    })
}
