//! Tracks how long the active browser tab spends on each domain and blocks domains for the rest
//! of a browser session.
//!
//! The core ([coordinator], [tracker], [blocker]) only talks to the browser through the traits
//! in [platform]. [host] runs it as a native messaging host for the extension.

pub mod blocker;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod host;
pub mod platform;
pub mod storage;
pub mod tracker;
pub mod utils;
