use std::time::Instant;

use thiserror::Error;
use time::UtcOffset;
use tokio_util::sync::CancellationToken;

use crate::core::config::{ReportMode, Settings};
use crate::core::{ids::prefixed_id, time as clock};
use crate::services::ai_gateway::{AiGateway, GatewayError};
use crate::services::detailed_grading;
use crate::services::intake::{self, IntakeError, IntakeLimits, SubmissionInput};
use crate::db::models::ReportJob;
use crate::services::progress_report;
use crate::services::score;
use crate::services::store::{HomeworkStore, NewGrading, NewSubmission, ReportSchedule};
use crate::services::subject_detection::{self, SubjectInfo};
use crate::tasks::reports::{self as report_tasks, ReportWakeup};

pub(crate) const GRADED_BY: &str = "Gemini AI";
const EFFORT: &str = "submitted";

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error(transparent)]
    Validation(#[from] IntakeError),
    #[error("student {0} not found")]
    StudentNotFound(String),
    #[error("failed to persist grading for student {student_id}")]
    Persistence {
        student_id: String,
        image_count: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("grading was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub(crate) struct PipelineConfig {
    pub(crate) limits: IntakeLimits,
    pub(crate) local_offset: UtcOffset,
    pub(crate) report_every_n_submissions: i64,
    pub(crate) report_mode: ReportMode,
}

impl PipelineConfig {
    fn report_schedule(&self) -> ReportSchedule {
        ReportSchedule {
            every_n_submissions: self.report_every_n_submissions,
            claim_for_caller: self.report_mode == ReportMode::Inline,
        }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            limits: IntakeLimits::from_settings(settings),
            local_offset: settings.grading().local_offset,
            report_every_n_submissions: settings.grading().report_every_n_submissions,
            report_mode: settings.grading().report_mode,
        }
    }
}

/// Everything the caller needs to answer a successful grading request.
#[derive(Debug, Clone)]
pub(crate) struct GradedHomework {
    pub(crate) submission: NewSubmission,
    pub(crate) grading: NewGrading,
    pub(crate) student_name: String,
    pub(crate) submission_number: i64,
    pub(crate) report_generated: bool,
}

impl GradedHomework {
    pub(crate) fn image_count(&self) -> usize {
        self.submission.image_refs.len()
    }
}

pub(crate) struct GradingPipeline<'a> {
    store: &'a dyn HomeworkStore,
    gateway: &'a dyn AiGateway,
    reports: &'a ReportWakeup,
    config: PipelineConfig,
}

impl<'a> GradingPipeline<'a> {
    pub(crate) fn new(
        store: &'a dyn HomeworkStore,
        gateway: &'a dyn AiGateway,
        reports: &'a ReportWakeup,
        config: PipelineConfig,
    ) -> Self {
        Self { store, gateway, reports, config }
    }

    pub(crate) async fn run(
        &self,
        input: SubmissionInput,
        cancel: &CancellationToken,
    ) -> Result<GradedHomework, GradingError> {
        let timer = Instant::now();
        let submission = intake::validate(input, &self.config.limits)?;
        let student_id = submission.student_id.clone();
        let image_count = submission.image_count();
        let persistence = |source| GradingError::Persistence {
            student_id: student_id.clone(),
            image_count,
            source,
        };

        let student = self
            .store
            .find_student(&student_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| GradingError::StudentNotFound(student_id.clone()))?;

        tracing::info!(student_id = %student_id, image_count, "Grading homework");

        let subject = subject_detection::detect(self.gateway, &submission.images, cancel)
            .await
            .map_err(cancelled)?;
        let draft = detailed_grading::grade(self.gateway, &subject, &submission.images, cancel)
            .await
            .map_err(cancelled)?;
        let reconciled = score::reconcile(
            draft.stated_score,
            draft.total_questions,
            draft.correct_answers,
            image_count,
        );

        if cancel.is_cancelled() {
            return Err(GradingError::Cancelled);
        }

        let now = clock::to_local_primitive(clock::now_utc(), self.config.local_offset);
        let new_submission = NewSubmission {
            id: prefixed_id("homework"),
            student_id: student_id.clone(),
            code: submission.code,
            image_refs: submission.refs,
            files_hash: submission.files_hash,
            submitted_at: now,
            academy_id: student.academy_id,
        };
        let new_grading = NewGrading {
            id: prefixed_id("grading"),
            score: reconciled.score,
            feedback: draft.feedback,
            strengths: draft.strengths,
            suggestions: draft.suggestions,
            subject: subject.subject.clone(),
            grade: subject.grade,
            completion: draft.completion,
            effort: EFFORT.to_string(),
            page_count: i32::try_from(image_count).unwrap_or(i32::MAX),
            graded_at: now,
            graded_by: GRADED_BY.to_string(),
            total_questions: reconciled.total_questions,
            correct_answers: reconciled.correct_answers,
            problem_analysis: draft.problem_analysis,
            weakness_types: draft.weakness_types,
            detailed_analysis: draft.detailed_analysis,
            study_direction: draft.study_direction,
            outcome: draft.outcome,
        };

        let recorded = self
            .store
            .record_graded_submission(&new_submission, &new_grading, self.config.report_schedule())
            .await
            .map_err(persistence)?;
        let submission_number = recorded.submission_number;

        let report_generated = match recorded.report_job {
            Some(job) => self.trigger_report(&job, cancel).await,
            None => false,
        };

        metrics::counter!("homework_gradings_total", "outcome" => new_grading.outcome.as_str())
            .increment(1);
        tracing::info!(
            student_id = %student_id,
            submission_id = %new_submission.id,
            outcome = new_grading.outcome.as_str(),
            subject = %subject_label(&subject),
            score = new_grading.score,
            submission_number,
            report_generated,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Homework graded"
        );

        Ok(GradedHomework {
            submission: new_submission,
            grading: new_grading,
            student_name: student.name,
            submission_number,
            report_generated,
        })
    }

    /// Background mode hands the committed job to the worker. Inline mode generates the
    /// report now and releases the job to the worker if that fails.
    async fn trigger_report(&self, job: &ReportJob, cancel: &CancellationToken) -> bool {
        match self.config.report_mode {
            ReportMode::Background => {
                self.reports.notify();
                true
            }
            ReportMode::Inline => {
                match progress_report::generate(
                    self.store,
                    self.gateway,
                    job,
                    self.config.local_offset,
                    cancel,
                )
                .await
                {
                    Ok(_) => true,
                    Err(err) => {
                        let now = clock::to_local_primitive(clock::now_utc(), self.config.local_offset);
                        report_tasks::release(self.store, job, &err, now).await;
                        self.reports.notify();
                        false
                    }
                }
            }
        }
    }
}

/// Stages recover every gateway error except cancellation.
fn cancelled(_: GatewayError) -> GradingError {
    GradingError::Cancelled
}

fn subject_label(subject: &SubjectInfo) -> String {
    if subject.detected {
        format!("{} ({}학년)", subject.subject, subject.grade)
    } else {
        format!("{} (default)", subject.subject)
    }
}
