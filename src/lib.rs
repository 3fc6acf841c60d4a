// ABOUTME: Library module for tabledump
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod serialization;
pub mod utils;
