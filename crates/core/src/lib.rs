//! Domain types shared by the GAIA lesson-module generation client.
//!
//! Holds the job payloads sent to the generation service, the result
//! shapes it returns, and the validators that sit between raw JSON and
//! those typed results.

pub mod error;
pub mod module;
pub mod module_outline;
pub mod types;
pub mod validation;
