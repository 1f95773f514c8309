//! aem-core: typed client for the Adobe Experience Manager HTTP API.
//!
//! Every remote call goes through [`AemClient::call`], which sends an
//! [`Operation`] over a [`Transport`] and turns the response into an
//! [`AemResult`] using the operation's status rules. Resource handles
//! ([`Aem`], [`Package`], [`Repository`], [`Path`], [`FlushAgent`], [`User`]) fill in
//! the call parameters; [`convergence`] polls derived state until slow
//! server-side work has finished.
//!
//! ## Transports
//!
//! - [`HttpTransport`]: reqwest over HTTP(S) with basic auth
//! - [`MemoryTransport`]: scripted replies for tests

pub mod client;
pub mod config;
pub mod convergence;
pub mod error;
pub mod fakes;
pub mod handlers;
pub mod http;
pub mod markup;
pub mod obs;
pub mod operation;
pub mod params;
pub mod resources;
pub mod response;
pub mod result;
pub mod sanitize;
pub mod telemetry;
pub mod transport;

pub use client::AemClient;
pub use config::ClientConfig;
pub use convergence::{
    converge, AttemptEvent, ConvergenceObserver, LenientInt, RetryOptions, RetryPolicy,
    TracingObserver,
};
pub use error::{AemError, Result, TransportError};
pub use fakes::{MemoryTransport, RecordingObserver};
pub use http::HttpTransport;
pub use operation::{Operation, ResourceKind};
pub use params::CallParams;
pub use resources::{Aem, FlushAgent, Package, PackageIdentity, Path, Repository, User};
pub use response::Response;
pub use result::{AemResult, ResultData};
pub use transport::Transport;

/// Crate version, reported by `aemctl --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
