pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod timed_tests;
