//! HTTP plumbing shared by the session and resource layers.
//!
//! This module provides the `Transport` abstraction with its default
//! reqwest implementation, the request/response types it exchanges, the
//! header names of the v1.0 authentication API, and the crate error types.

pub mod error;
pub mod headers;
pub mod transport;

pub use error::{Error, LastError, Result, TransportError};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
