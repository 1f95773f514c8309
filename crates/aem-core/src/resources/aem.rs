//! Instance-wide readiness checks.
//!
//! Each check answers `Bool(true)` once the instance is ready for that
//! concern; the `*_wait_until_*` variants poll it through [`converge`].

use tracing::instrument;

use crate::client::AemClient;
use crate::convergence::{converge, RetryOptions};
use crate::error::Result;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::result::AemResult;

/// The AEM instance itself.
pub struct Aem<'a> {
    client: &'a AemClient,
}

impl<'a> Aem<'a> {
    pub fn new(client: &'a AemClient) -> Self {
        Aem { client }
    }

    /// Fetch the login page. Ready once the quickstart home page is served.
    pub async fn get_login_page(&self) -> Result<AemResult> {
        self.client
            .call(Operation::AemGetLoginPage, &CallParams::new())
            .await
    }

    /// Read the package manager's install status. Ready when installation
    /// has finished with no pending items.
    pub async fn get_install_status(&self) -> Result<AemResult> {
        self.client
            .call(Operation::AemGetInstallStatus, &CallParams::new())
            .await
    }

    /// Check whether the package manager servlet is active.
    pub async fn get_package_manager_servlet_status(&self) -> Result<AemResult> {
        self.client
            .call(Operation::AemGetPackageManagerServletStatus, &CallParams::new())
            .await
    }

    /// Poll the login page until the instance has finished starting.
    ///
    /// Returns the first ready result.
    #[instrument(skip_all, fields(resource = "aem"))]
    pub async fn get_login_page_wait_until_ready(
        &self,
        options: &RetryOptions,
    ) -> Result<AemResult> {
        let policy = options.policy();
        converge(&policy, self.client.observer(), "Login page", true, move || {
            self.get_login_page()
        })
        .await
    }

    /// Poll the install status until no package installation is running.
    #[instrument(skip_all, fields(resource = "aem"))]
    pub async fn get_install_status_wait_until_finished(
        &self,
        options: &RetryOptions,
    ) -> Result<AemResult> {
        let policy = options.policy();
        converge(&policy, self.client.observer(), "Install status", true, move || {
            self.get_install_status()
        })
        .await
    }

    /// Poll until the package manager servlet answers as active.
    #[instrument(skip_all, fields(resource = "aem"))]
    pub async fn get_package_manager_servlet_status_wait_until_ready(
        &self,
        options: &RetryOptions,
    ) -> Result<AemResult> {
        let policy = options.policy();
        converge(
            &policy,
            self.client.observer(),
            "Package Manager servlet",
            true,
            move || self.get_package_manager_servlet_status(),
        )
        .await
    }
}
