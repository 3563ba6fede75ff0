pub mod common;
pub mod event_log;
pub mod naming;
pub mod seeding;
pub mod smoothing;
