//! locheal library crate
//!
//! Capture failing UI locators during test runs, resolve their declaration
//! sites, and heal them later with reviewed single-line patches.

pub mod config;
pub mod github;
pub mod heal;
pub mod oracle;
pub mod patch;
pub mod record;
pub mod recorder;
pub mod resolve;
pub mod store;
pub mod util;
