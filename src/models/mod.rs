pub mod schedule;
pub mod user;
