//! Built-in stages.
//!
//! - [`json`] - Content-type gated JSON body decoding

pub mod json;

pub use json::JsonDecoder;
