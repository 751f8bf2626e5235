use thiserror::Error;
use time::{Date, Duration, PrimitiveDateTime, Time};

use crate::core::time::parse_date;
use crate::db::models::{HomeworkResultRow, ProblemAnalysis};
use crate::services::store::ResultFilter;

pub(crate) const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ResultQueryError {
    #[error("invalid {field}: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str },
    #[error("startDate and endDate must be provided together")]
    IncompleteRange,
    #[error("startDate must not be after endDate")]
    ReversedRange,
    #[error("date range must not exceed 366 days")]
    RangeTooLong,
}

/// Inclusive local-date range that a results query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DateRange {
    pub(crate) start: Date,
    pub(crate) end: Date,
}

impl DateRange {
    pub(crate) fn filter(self, academy_id: Option<i64>) -> ResultFilter {
        let until = self.end.next_day().unwrap_or(self.end);
        ResultFilter {
            from: PrimitiveDateTime::new(self.start, Time::MIDNIGHT),
            until: PrimitiveDateTime::new(until, Time::MIDNIGHT),
            academy_id,
        }
    }
}

/// `date` wins over a range; with neither, the local `today` is used.
pub(crate) fn resolve_range(
    date: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    today: Date,
) -> Result<DateRange, ResultQueryError> {
    let parse = |value: &str, field: &'static str| {
        parse_date(value).ok_or(ResultQueryError::InvalidDate { field })
    };

    if let Some(date) = present(date) {
        let day = parse(date, "date")?;
        return Ok(DateRange { start: day, end: day });
    }

    match (present(start_date), present(end_date)) {
        (Some(start), Some(end)) => {
            let start = parse(start, "startDate")?;
            let end = parse(end, "endDate")?;
            if start > end {
                return Err(ResultQueryError::ReversedRange);
            }
            if end - start >= Duration::days(MAX_RANGE_DAYS) {
                return Err(ResultQueryError::RangeTooLong);
            }
            Ok(DateRange { start, end })
        }
        (None, None) => Ok(DateRange { start: today, end: today }),
        _ => Err(ResultQueryError::IncompleteRange),
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResultStats {
    pub(crate) total_submissions: usize,
    pub(crate) average_score: f64,
    pub(crate) today_submissions: usize,
    pub(crate) pending_review: usize,
}

/// Ungraded rows count as zero in the average.
pub(crate) fn stats(rows: &[HomeworkResultRow], today: Date) -> ResultStats {
    let total = rows.len();
    let score_sum: f64 = rows.iter().map(|row| row.score.unwrap_or(0.0)).sum();
    let average_score =
        if total == 0 { 0.0 } else { (score_sum / total as f64 * 10.0).round() / 10.0 };

    ResultStats {
        total_submissions: total,
        average_score,
        today_submissions: rows.iter().filter(|row| row.submitted_at.date() == today).count(),
        pending_review: rows.iter().filter(|row| row.grading_id.is_none()).count(),
    }
}

pub(crate) fn concepts_needed(weakness_types: &[String]) -> Vec<String> {
    weakness_types.iter().map(|weakness| format!("{weakness} 개념 복습")).collect()
}

pub(crate) fn mistakes(problems: &[ProblemAnalysis]) -> Vec<String> {
    problems
        .iter()
        .filter(|problem| !problem.is_correct)
        .map(|problem| format!("{} 문제: {} (정답이 아님)", problem.problem, problem.answer))
        .collect()
}

/// Guidance by score band for gradings stored without a study direction.
pub(crate) fn fallback_study_direction(score: f64, weakness_types: &[String]) -> String {
    if score >= 90.0 {
        "현재 수준을 잘 유지하고 있습니다. 심화 문제에 도전해보세요.".to_string()
    } else if score >= 70.0 {
        if weakness_types.is_empty() {
            "꾸준히 학습하면 더 높은 점수를 받을 수 있습니다.".to_string()
        } else {
            format!(
                "{} 부분을 집중적으로 복습하면 더 높은 점수를 받을 수 있습니다.",
                weakness_types.join(", ")
            )
        }
    } else {
        "기본 개념부터 천천히 복습하는 것을 권장합니다. 선생님과 상담이 필요할 수 있습니다."
            .to_string()
    }
}
