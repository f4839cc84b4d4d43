//! quickgpt - chat relay for hosted LLM APIs
//!
//! This library provides the relay core: message normalization, text/vision
//! model routing, the upstream completion client, and the simulated SSE
//! stream served to the browser.

pub mod config;
pub mod error;
pub mod proxy;
pub mod router;

pub use config::Config;
pub use error::{Error, Result};
