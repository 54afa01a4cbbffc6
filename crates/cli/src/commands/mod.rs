//! CLI subcommands

pub mod check;
pub mod classify;
pub mod decode;
pub mod predict;
