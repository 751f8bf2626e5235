pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod homework;
pub(crate) mod router;
pub(crate) mod students;
