//! Package lifecycle, derived state queries and convergent variants.
//!
//! Derived queries (`exists`, `is_installed`, `is_built`, ...) are computed
//! from one `list_all` inventory each; they never raise for missing entries,
//! only for transport failures.

use std::path::Path as FsPath;

use tracing::{instrument, warn};
use xmltree::Element;

use crate::client::AemClient;
use crate::convergence::{converge, RetryOptions};
use crate::error::Result;
use crate::markup;
use crate::operation::Operation;
use crate::params::{leading_int, CallParams};
use crate::result::{AemResult, ResultData};

/// Group, name and version of one package artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    pub group_name: String,
    pub package_name: String,
    pub package_version: String,
}

impl PackageIdentity {
    pub fn new(group_name: &str, package_name: &str, package_version: &str) -> Self {
        PackageIdentity {
            group_name: group_name.to_string(),
            package_name: package_name.to_string(),
            package_version: package_version.to_string(),
        }
    }

    pub fn params(&self) -> CallParams {
        CallParams::new()
            .with("group_name", &self.group_name)
            .with("package_name", &self.package_name)
            .with("package_version", &self.package_version)
    }

    /// `<package>` entry of an inventory with the same group and name
    /// (and version, when `with_version`).
    fn matches(&self, entry: &Element, with_version: bool) -> bool {
        entry.name == "package"
            && markup::child_text(entry, "group") == self.group_name
            && markup::child_text(entry, "name") == self.package_name
            && (!with_version || markup::child_text(entry, "version") == self.package_version)
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}-{}",
            self.group_name, self.package_name, self.package_version
        )
    }
}

/// Remote package manager entry for one package.
pub struct Package<'a> {
    client: &'a AemClient,
    identity: PackageIdentity,
}

impl<'a> Package<'a> {
    pub fn new(
        client: &'a AemClient,
        group_name: &str,
        package_name: &str,
        package_version: &str,
    ) -> Self {
        Package {
            client,
            identity: PackageIdentity::new(group_name, package_name, package_version),
        }
    }

    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    async fn call(&self, operation: Operation, params: CallParams) -> Result<AemResult> {
        self.client.call(operation, &params).await
    }

    pub async fn create(&self) -> Result<AemResult> {
        self.call(Operation::PackageCreate, self.identity.params()).await
    }

    /// Replace the package filter.
    ///
    /// `filter` is the JSON filter definition, e.g.
    /// `[{"root": "/apps/geometrixx", "rules": []}]`.
    pub async fn update(&self, filter: &str) -> Result<AemResult> {
        let params = self.identity.params().with("filter", filter);
        self.call(Operation::PackageUpdate, params).await
    }

    pub async fn delete(&self) -> Result<AemResult> {
        self.call(Operation::PackageDelete, self.identity.params()).await
    }

    pub async fn build(&self) -> Result<AemResult> {
        self.call(Operation::PackageBuild, self.identity.params()).await
    }

    /// Install without waiting; `recursive` also installs subpackages.
    pub async fn install(&self, recursive: bool) -> Result<AemResult> {
        let params = self.identity.params().with("recursive", recursive);
        self.call(Operation::PackageInstall, params).await
    }

    pub async fn uninstall(&self) -> Result<AemResult> {
        self.call(Operation::PackageUninstall, self.identity.params()).await
    }

    /// Add the package to the replication queues.
    pub async fn replicate(&self) -> Result<AemResult> {
        self.call(Operation::PackageReplicate, self.identity.params()).await
    }

    /// Download to `{dir}/{name}-{version}.zip`.
    pub async fn download(&self, dir: &FsPath) -> Result<AemResult> {
        let params = self
            .identity
            .params()
            .with("file_path", dir.display());
        self.call(Operation::PackageDownload, params).await
    }

    /// Upload `{dir}/{name}-{version}.zip` without waiting. With `force`
    /// an existing package of the same identity is overwritten.
    pub async fn upload(&self, dir: &FsPath, force: bool) -> Result<AemResult> {
        let params = self
            .identity
            .params()
            .with("file_path", dir.display())
            .with("force", force);
        self.call(Operation::PackageUpload, params).await
    }

    /// Filter paths of the package, as `Strings` data.
    pub async fn get_filter(&self) -> Result<AemResult> {
        self.call(Operation::PackageGetFilter, self.identity.params()).await
    }

    /// Full package inventory of the instance, as a `Document` rooted at
    /// `<packages>`.
    pub async fn list_all(&self) -> Result<AemResult> {
        self.call(Operation::PackageListAll, self.identity.params()).await
    }

    /// Activate every filter path of the package.
    ///
    /// Returns the filter result followed by one activation result per path,
    /// in filter order. A failed activation is kept in the list and the
    /// remaining paths are still activated; transport errors abort.
    pub async fn activate_filter(
        &self,
        ignore_deactivated: bool,
        modified_only: bool,
    ) -> Result<Vec<AemResult>> {
        let filter = self.get_filter().await?;
        let paths = filter
            .data()
            .as_strings()
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        let mut results = Vec::with_capacity(paths.len() + 1);
        results.push(filter);
        for path in paths {
            let target = self.client.path(&path);
            let activation = target.activate(ignore_deactivated, modified_only).await?;
            if !activation.is_success() {
                warn!(
                    package = %self.identity,
                    path = %target.as_str(),
                    message = %activation.message(),
                    "activation failed, continuing"
                );
            }
            results.push(activation);
        }
        Ok(results)
    }

    /// Inventory entries, or the failed listing to return as-is.
    async fn inventory(&self) -> Result<std::result::Result<Option<Element>, AemResult>> {
        let list = self.list_all().await?;
        if !list.is_success() {
            return Ok(Err(AemResult::failure(list.message())));
        }
        match list.into_data() {
            ResultData::Document(packages) => Ok(Ok(Some(packages))),
            _ => Ok(Ok(None)),
        }
    }

    fn find<'e>(&self, packages: &'e Option<Element>, with_version: bool) -> Option<&'e Element> {
        packages
            .iter()
            .flat_map(markup::child_elements)
            .find(|entry| self.identity.matches(entry, with_version))
    }

    fn state(&self, value: bool, state: &str) -> AemResult {
        AemResult::new(format!("Package {} {}", self.identity, state))
            .with_data(ResultData::Bool(value))
    }

    fn answer(&self, value: bool, yes: &str, no: &str) -> AemResult {
        self.state(value, if value { yes } else { no })
    }

    /// Every version of this group and name, in inventory order.
    pub async fn get_versions(&self) -> Result<AemResult> {
        let packages = match self.inventory().await? {
            Ok(packages) => packages,
            Err(failed) => return Ok(failed),
        };

        let versions: Vec<String> = packages
            .iter()
            .flat_map(markup::child_elements)
            .filter(|entry| self.identity.matches(entry, false))
            .map(|entry| markup::child_text(entry, "version"))
            .filter(|version| !version.is_empty())
            .map(str::to_string)
            .collect();

        Ok(AemResult::new(format!(
            "Package {} has {} version(s)",
            self.identity,
            versions.len()
        ))
        .with_data(ResultData::Strings(versions)))
    }

    pub async fn exists(&self) -> Result<AemResult> {
        let packages = match self.inventory().await? {
            Ok(packages) => packages,
            Err(failed) => return Ok(failed),
        };
        let exists = self.find(&packages, true).is_some();
        Ok(self.answer(exists, "exists", "does not exist"))
    }

    /// Uploaded means the package exists.
    pub async fn is_uploaded(&self) -> Result<AemResult> {
        let exists = self.exists().await?;
        match exists.data().as_bool() {
            Some(uploaded) => Ok(self.answer(uploaded, "is uploaded", "is not uploaded")),
            None => Ok(exists),
        }
    }

    /// Installed means the entry has a `lastUnpackedBy` user.
    pub async fn is_installed(&self) -> Result<AemResult> {
        let packages = match self.inventory().await? {
            Ok(packages) => packages,
            Err(failed) => return Ok(failed),
        };
        let installed = self
            .find(&packages, true)
            .and_then(|entry| entry.get_child("lastUnpackedBy"))
            .and_then(markup::own_text)
            .map(str::trim)
            .is_some_and(|by| !by.is_empty() && by != "null");
        Ok(self.answer(installed, "is installed", "is not installed"))
    }

    /// Empty means a declared size of 0; a missing size counts as 0.
    pub async fn is_empty(&self) -> Result<AemResult> {
        let packages = match self.inventory().await? {
            Ok(packages) => packages,
            Err(failed) => return Ok(failed),
        };
        let size = self
            .find(&packages, true)
            .map(|entry| leading_int(markup::child_text(entry, "size")))
            .unwrap_or(0);
        Ok(self.answer(size == 0, "is empty", "is not empty"))
    }

    /// Built means the package exists and is not empty.
    pub async fn is_built(&self) -> Result<AemResult> {
        let exists = self.exists().await?;
        match exists.data().as_bool() {
            None => return Ok(exists),
            Some(false) => {
                return Ok(self.state(false, "is not built because it does not exist"))
            }
            Some(true) => {}
        }

        let empty = self.is_empty().await?;
        match empty.data().as_bool() {
            None => Ok(empty),
            Some(true) => Ok(self.state(false, "is not built because it is empty")),
            Some(false) => Ok(self.state(true, "is built")),
        }
    }

    /// Upload, then poll until the package is listed.
    ///
    /// Returns the upload result; fails with the last check message if the
    /// package never shows up.
    #[instrument(skip_all, fields(resource = "package", package = %self.identity))]
    pub async fn upload_wait_until_ready(
        &self,
        dir: &FsPath,
        force: bool,
        options: &RetryOptions,
    ) -> Result<AemResult> {
        let policy = options.policy();
        let result = self.upload(dir, force).await?;
        converge(&policy, self.client.observer(), "Upload", true, move || {
            self.is_uploaded()
        })
        .await?;
        Ok(result)
    }

    /// Install, then poll until the package reports an unpacker.
    #[instrument(skip_all, fields(resource = "package", package = %self.identity))]
    pub async fn install_wait_until_ready(
        &self,
        recursive: bool,
        options: &RetryOptions,
    ) -> Result<AemResult> {
        let policy = options.policy();
        let result = self.install(recursive).await?;
        converge(&policy, self.client.observer(), "Install", true, move || {
            self.is_installed()
        })
        .await?;
        Ok(result)
    }

    /// Delete, then poll until the package is no longer listed.
    #[instrument(skip_all, fields(resource = "package", package = %self.identity))]
    pub async fn delete_wait_until_ready(&self, options: &RetryOptions) -> Result<AemResult> {
        let policy = options.policy();
        let result = self.delete().await?;
        converge(&policy, self.client.observer(), "Delete", false, move || {
            self.is_uploaded()
        })
        .await?;
        Ok(result)
    }

    /// Build, then poll until the package exists with a non-zero size.
    #[instrument(skip_all, fields(resource = "package", package = %self.identity))]
    pub async fn build_wait_until_ready(&self, options: &RetryOptions) -> Result<AemResult> {
        let policy = options.policy();
        let result = self.build().await?;
        converge(&policy, self.client.observer(), "Build", true, move || {
            self.is_built()
        })
        .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryTransport;
    use crate::response::Response;
    use std::sync::Arc;

    fn inventory(entries: &str) -> Response {
        Response::new(
            200,
            format!(
                concat!(
                    r#"<crx><response><data><packages>{}</packages></data>"#,
                    r#"<status code="200">ok</status></response></crx>"#
                ),
                entries
            ),
        )
    }

    fn client_with(listing: Response) -> (Arc<MemoryTransport>, AemClient) {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(Operation::PackageListAll, listing);
        let client = AemClient::new(transport.clone());
        (transport, client)
    }

    #[test]
    fn test_identity_display_and_params() {
        let identity = PackageIdentity::new("g", "p", "1.0");
        assert_eq!(identity.to_string(), "g/p-1.0");
        assert_eq!(identity.params().get("package_version"), Some("1.0"));
    }

    #[tokio::test]
    async fn test_get_versions_keeps_remote_order() {
        let (_, client) = client_with(inventory(
            "<package><group>g</group><name>p</name><version>2.0</version></package>\
             <package><group>g</group><name>other</name><version>9.9</version></package>\
             <package><group>g</group><name>p</name><version></version></package>\
             <package><group>g</group><name>p</name><version>1.0</version></package>",
        ));
        let result = client.package("g", "p", "1.0").get_versions().await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            result.data().as_strings().unwrap(),
            &["2.0".to_string(), "1.0".to_string()]
        );
        assert_eq!(result.message(), "Package g/p-1.0 has 2 version(s)");
    }

    #[tokio::test]
    async fn test_is_installed_sentinels() {
        for (field, expected) in [
            ("", false),
            ("<lastUnpackedBy/>", false),
            ("<lastUnpackedBy>null</lastUnpackedBy>", false),
            ("<lastUnpackedBy>admin</lastUnpackedBy>", true),
        ] {
            let (_, client) = client_with(inventory(&format!(
                "<package><group>g</group><name>p</name><version>1.0</version>{}</package>",
                field
            )));
            let result = client.package("g", "p", "1.0").is_installed().await.unwrap();
            assert_eq!(result.data().as_bool(), Some(expected), "field {:?}", field);
        }
    }

    #[tokio::test]
    async fn test_is_built_short_circuits_when_missing() {
        let (transport, client) = client_with(inventory(""));
        let result = client.package("g", "p", "1.0").is_built().await.unwrap();
        assert_eq!(result.data().as_bool(), Some(false));
        assert_eq!(
            result.message(),
            "Package g/p-1.0 is not built because it does not exist"
        );
        // exists only; is_empty never listed
        assert_eq!(transport.call_count(Operation::PackageListAll), 1);
    }

    #[tokio::test]
    async fn test_failed_listing_is_not_an_answer() {
        let (_, client) = client_with(Response::new(
            200,
            r#"<crx><response><status code="500">error</status></response></crx>"#,
        ));
        let result = client.package("g", "p", "1.0").exists().await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.data(), &ResultData::None);
        assert!(result.message().contains("status code 500"));
    }

    #[tokio::test]
    async fn test_activate_filter_continues_after_failure() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(
            Operation::PackageGetFilter,
            Response::new(
                200,
                r#"{"f0":{"root":"/apps/a"},"f1":{"root":"/apps/b"},"f2":{"root":"/apps/c"}}"#,
            ),
        );
        transport.enqueue(Operation::PathActivate, Response::new(200, ""));
        transport.enqueue(Operation::PathActivate, Response::new(500, "boom"));
        transport.enqueue(Operation::PathActivate, Response::new(200, ""));
        let client = AemClient::new(transport.clone());

        let results = client
            .package("g", "p", "1.0")
            .activate_filter(true, false)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(
            results.iter().map(AemResult::is_success).collect::<Vec<_>>(),
            vec![true, true, false, true]
        );
        assert_eq!(results[3].message(), "Path /apps/c activated");

        let paths: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|(op, _)| *op == Operation::PathActivate)
            .map(|(_, params)| params.get_or_empty("path").to_string())
            .collect();
        assert_eq!(paths, vec!["/apps/a", "/apps/b", "/apps/c"]);
    }

    #[tokio::test]
    async fn test_is_empty_without_size_element() {
        let (_, client) = client_with(inventory(
            "<package><group>g</group><name>p</name><version>1.0</version></package>",
        ));
        let result = client.package("g", "p", "1.0").is_empty().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.data(), &ResultData::Bool(true));
        assert_eq!(result.message(), "Package g/p-1.0 is empty");
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_wait_futures_are_send() {
        let (_, client) = client_with(inventory(""));
        let package = client.package("g", "p", "1.0");
        let options = RetryOptions::new();
        let dir = std::env::temp_dir();
        assert_send(&package.upload_wait_until_ready(&dir, false, &options));
        assert_send(&package.install_wait_until_ready(false, &options));
        assert_send(&package.delete_wait_until_ready(&options));
        assert_send(&package.build_wait_until_ready(&options));
    }
}
