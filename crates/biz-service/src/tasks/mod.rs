//! Background tasks.

pub mod stat;

pub use stat::run_stat_task;
