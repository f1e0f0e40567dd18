//! Library entry for installd exposing the install pipeline for the binary and integration tests.

pub mod app;
pub mod args;
pub mod catalog;
pub mod config;
pub mod install;
pub mod logic;
pub mod platform;
pub mod server;
pub mod store;
pub mod template;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;
