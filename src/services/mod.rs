pub(crate) mod ai_gateway;
pub(crate) mod detailed_grading;
pub(crate) mod grading_pipeline;
pub(crate) mod homework_results;
pub(crate) mod intake;
pub(crate) mod json_extract;
pub(crate) mod progress_report;
pub(crate) mod score;
pub(crate) mod similar_problems;
pub(crate) mod store;
pub(crate) mod subject_detection;
