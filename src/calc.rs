use crate::model::{AttendanceStatus, Grade};
use serde::Serialize;
use thiserror::Error;

/// Client-side rule violation. Raised before anything is sent to the store,
/// so a failed validation never leaves a partial write behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError {
        message: message.into(),
    }
}

/// Half-up rounding for non-negative percentages (Math.round semantics).
pub fn round_percent(x: f64) -> i64 {
    x.round() as i64
}

/// Whole-number percentage for a single assignment. The caller must have
/// validated `total_points` already; a non-positive divisor is an error
/// here, never a silent zero.
pub fn percentage(score: f64, total_points: f64) -> Result<i64, ValidationError> {
    if total_points <= 0.0 {
        return Err(invalid("totalPoints must be greater than zero"));
    }
    Ok(round_percent(100.0 * score / total_points))
}

pub fn validate_grade(score: f64, total_points: f64) -> Result<(), ValidationError> {
    if !score.is_finite() || !total_points.is_finite() {
        return Err(invalid("score and totalPoints must be numeric"));
    }
    if score < 0.0 {
        return Err(invalid("score must not be negative"));
    }
    if total_points <= 0.0 {
        return Err(invalid("totalPoints must be greater than zero"));
    }
    if score > total_points {
        return Err(invalid("score must not exceed totalPoints"));
    }
    Ok(())
}

/// Rounded mean of per-grade percentages; `0` for an empty scope.
/// Percentages are averaged unrounded and rounded once at the end, matching
/// how the grade pages always displayed class figures.
pub fn average_percent<I>(pairs: I) -> i64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for (score, total_points) in pairs {
        if total_points <= 0.0 {
            continue;
        }
        sum += 100.0 * score / total_points;
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    round_percent(sum / count as f64)
}

pub fn class_average(grades: &[Grade], class_id: i64) -> i64 {
    average_percent(
        grades
            .iter()
            .filter(|g| g.class_id == class_id)
            .map(|g| (g.score, g.total_points)),
    )
}

pub fn student_average(grades: &[Grade], student_id: i64) -> i64 {
    average_percent(
        grades
            .iter()
            .filter(|g| g.student_id == student_id)
            .map(|g| (g.score, g.total_points)),
    )
}

/// Most recent `limit` grades, newest first. The sort is stable so grades
/// sharing a date keep the store's natural order.
pub fn recent_grades(grades: &[Grade], limit: usize) -> Vec<Grade> {
    let mut sorted = grades.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub present_percentage: i64,
}

pub fn tally_attendance<'a, I>(statuses: I) -> AttendanceTally
where
    I: IntoIterator<Item = &'a AttendanceStatus>,
{
    let mut total = 0_usize;
    let mut present = 0_usize;
    let mut absent = 0_usize;
    let mut late = 0_usize;
    let mut excused = 0_usize;
    for status in statuses {
        total += 1;
        match status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::Excused => excused += 1,
        }
    }
    let present_percentage = if total > 0 {
        round_percent(100.0 * present as f64 / total as f64)
    } else {
        0
    };
    AttendanceTally {
        total,
        present,
        absent,
        late,
        excused,
        present_percentage,
    }
}

/// Canonical `YYYY-MM-DD` form of a date parameter. Accepts either a plain
/// date string or a full RFC 3339 timestamp, from which the date part is
/// taken.
pub fn normalize_date(raw: &str) -> Result<String, ValidationError> {
    let t = raw.trim();
    if let Ok(d) = chrono::NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Ok(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Ok(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    Err(invalid("date must be YYYY-MM-DD or an RFC 3339 timestamp"))
}
