//! # gateway-protocol
//!
//! Message types exchanged with the gateway backend REST API.
//!
//! This crate defines:
//! - Response envelopes (`{ok, error}` acknowledgements, tail status, browse results)
//! - Probe requests for connection tests
//! - Dashboard telemetry with derived pipeline metrics
//! - A small JSON codec with a typed error

pub mod codec;
pub mod messages;
pub mod telemetry;

pub use codec::{decode, decode_value, encode, CodecError};
pub use messages::*;
pub use telemetry::*;
