//! Library half of the `gaia` command-line client.
//!
//! [`commands`] loads job payloads from disk and runs them through a
//! [`TaskClient`](gaia_tasks::TaskClient); [`progress`] turns a task's
//! progress stream into log lines.

pub mod commands;
pub mod progress;
