//! Handlers shipped with the test bot.

pub mod help;
pub mod ping;
pub mod remember;
