//! Generic call dispatcher and resource factories.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::convergence::{ConvergenceObserver, TracingObserver};
use crate::error::{Result, TransportError};
use crate::http::HttpTransport;
use crate::obs;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::resources::{Aem, FlushAgent, Package, Path, Repository, User};
use crate::result::AemResult;
use crate::transport::Transport;

/// Entry point for all operations against one AEM instance.
///
/// Cheap to clone; clones share the transport and observer.
#[derive(Clone)]
pub struct AemClient {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn ConvergenceObserver>,
}

impl AemClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        AemClient {
            transport,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Client over HTTP for the given instance.
    pub fn from_config(config: ClientConfig) -> std::result::Result<Self, TransportError> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Replace the observer that receives convergence progress.
    pub fn with_observer(mut self, observer: Arc<dyn ConvergenceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn observer(&self) -> &dyn ConvergenceObserver {
        self.observer.as_ref()
    }

    /// Send one operation and interpret its response through the
    /// operation's status rules.
    ///
    /// A status with no rule yields a non-success result naming the status.
    pub async fn call(&self, operation: Operation, params: &CallParams) -> Result<AemResult> {
        obs::emit_operation_called(operation);
        let response = self.transport.call(operation, params).await?;
        let status = response.status_code;

        let result = match operation.spec().rule_for(status) {
            Some(rule) => rule.handler.handle(response, rule, params)?,
            None => AemResult::failure(format!(
                "Unexpected response status {} for {}",
                status, operation
            ))
            .with_response(response),
        };

        obs::emit_operation_completed(operation, status, result.is_success());
        Ok(result)
    }

    pub fn aem(&self) -> Aem<'_> {
        Aem::new(self)
    }

    pub fn package(
        &self,
        group_name: &str,
        package_name: &str,
        package_version: &str,
    ) -> Package<'_> {
        Package::new(self, group_name, package_name, package_version)
    }

    pub fn repository(&self) -> Repository<'_> {
        Repository::new(self)
    }

    pub fn path(&self, path: &str) -> Path<'_> {
        Path::new(self, path)
    }

    pub fn flush_agent(&self, run_mode: &str, name: &str) -> FlushAgent<'_> {
        FlushAgent::new(self, run_mode, name)
    }

    pub fn user(&self, path: &str, name: &str) -> User<'_> {
        User::new(self, path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryTransport;
    use crate::response::Response;

    #[tokio::test]
    async fn test_call_applies_status_rule() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(Operation::RepositoryBlockWrites, Response::new(200, ""));
        let client = AemClient::new(transport.clone());

        let result = client
            .call(Operation::RepositoryBlockWrites, &CallParams::new())
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.message(), "Repository writes blocked");
        assert_eq!(result.response().map(|r| r.status_code), Some(200));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_failure_result() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(Operation::RepositoryBlockWrites, Response::new(403, "denied"));
        let client = AemClient::new(transport);

        let result = client
            .call(Operation::RepositoryBlockWrites, &CallParams::new())
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.message(),
            "Unexpected response status 403 for repository.block_writes"
        );
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = Arc::new(MemoryTransport::new());
        transport.enqueue_failure(Operation::RepositoryUnblockWrites, "timed out");
        let client = AemClient::new(transport);

        let err = client
            .call(Operation::RepositoryUnblockWrites, &CallParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AemError::Transport(_)));
    }
}
