//! Transport seam between the client and the wire.
//!
//! A transport turns one typed [`Operation`] plus its parameters into a raw
//! [`Response`]. It knows nothing about success messages or markup; that is
//! the handlers' job. Implementations:
//! - [`HttpTransport`](crate::http::HttpTransport): reqwest against a live instance
//! - [`MemoryTransport`](crate::fakes::MemoryTransport): scripted, for tests

use async_trait::async_trait;

use crate::error::TransportError;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::response::Response;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call. Connection and timeout failures are errors; any
    /// HTTP status, including 4xx/5xx, is a `Response`.
    async fn call(&self, operation: Operation, params: &CallParams)
        -> Result<Response, TransportError>;
}
