//! Claude Code Stream - Claude Code stream-json output as typed chunks.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod display;
