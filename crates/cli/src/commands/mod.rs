//! CLI Commands

pub mod ai;
pub mod record;
pub mod replay;
pub mod tests;
