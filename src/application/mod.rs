pub mod bootstrap;
pub mod commands;
pub mod schedule;
pub mod streak;
