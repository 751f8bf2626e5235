pub(crate) mod health;
pub(crate) mod homework_gradings;
pub(crate) mod homework_submissions;
pub(crate) mod report_jobs;
pub(crate) mod reports;
pub(crate) mod submission_counters;
pub(crate) mod users;
pub(crate) mod weaknesses;
