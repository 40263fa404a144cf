pub mod common;
pub mod payment;
pub mod schedule;
pub mod user;
