pub mod answers;
pub mod chunks;
pub mod ingestion;
pub mod mastery;
pub mod plan_logs;
pub mod questions;
pub mod sessions;
pub mod topics;
pub mod users;
