//! Credential handling shared by the CLI and the install path.

pub mod password;
