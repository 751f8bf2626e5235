use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Rows are inserted as `Submitted` and flipped to `Graded` once their grading row
/// exists in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "homeworkstatus", rename_all = "lowercase")]
pub(crate) enum HomeworkStatus {
    Submitted,
    Graded,
}

impl HomeworkStatus {
    pub(crate) fn from_graded(graded: bool) -> Self {
        if graded {
            Self::Graded
        } else {
            Self::Submitted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "reportjobstatus", rename_all = "lowercase")]
pub(crate) enum ReportJobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl ReportJobStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Which path produced a grading payload. Persisted next to the result so fallback
/// grades stay distinguishable from real ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gradingoutcome", rename_all = "snake_case")]
pub(crate) enum GradingOutcome {
    AiGraded,
    ParseFallback,
    GatewayFallback,
}

impl GradingOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AiGraded => "ai_graded",
            Self::ParseFallback => "parse_fallback",
            Self::GatewayFallback => "gateway_fallback",
        }
    }
}
