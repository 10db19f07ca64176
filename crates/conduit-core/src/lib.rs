//! # Conduit Core
//!
//! Core types shared by every Conduit crate.
//!
//! - [`Message`] - An inbound delivery: raw payload, properties and an optional decoded body
//! - [`MessageProperties`] - Broker-level metadata such as the content type
//! - [`DeliveryId`] - UUID v7 identifier used for log correlation
//! - [`ConduitError`] - Standard error type returned by route handlers

#![doc(html_root_url = "https://docs.rs/conduit-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod message;

pub use error::{ConduitError, ConduitResult, ErrorCategory};
pub use message::{DeliveryId, Message, MessageProperties};
