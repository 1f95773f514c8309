//! Operation catalogue: every remote call the client can make, with the
//! status rules that interpret its response.

use crate::handlers::Handler;

/// Kind of remote resource an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Aem,
    Package,
    Repository,
    Path,
    FlushAgent,
    User,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Aem => "aem",
            ResourceKind::Package => "package",
            ResourceKind::Repository => "repository",
            ResourceKind::Path => "path",
            ResourceKind::FlushAgent => "flush_agent",
            ResourceKind::User => "user",
        }
    }
}

/// A single remote API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AemGetLoginPage,
    AemGetInstallStatus,
    AemGetPackageManagerServletStatus,
    PackageCreate,
    PackageUpdate,
    PackageDelete,
    PackageBuild,
    PackageInstall,
    PackageUninstall,
    PackageReplicate,
    PackageDownload,
    PackageUpload,
    PackageGetFilter,
    PackageListAll,
    RepositoryBlockWrites,
    RepositoryUnblockWrites,
    PathActivate,
    FlushAgentCreateUpdate,
    FlushAgentDelete,
    FlushAgentExists,
    UserCreate,
    UserChangePassword,
}

impl Operation {
    pub fn resource(self) -> ResourceKind {
        use Operation::*;
        match self {
            AemGetLoginPage | AemGetInstallStatus | AemGetPackageManagerServletStatus => {
                ResourceKind::Aem
            }
            PackageCreate | PackageUpdate | PackageDelete | PackageBuild | PackageInstall
            | PackageUninstall | PackageReplicate | PackageDownload | PackageUpload
            | PackageGetFilter | PackageListAll => ResourceKind::Package,
            RepositoryBlockWrites | RepositoryUnblockWrites => ResourceKind::Repository,
            PathActivate => ResourceKind::Path,
            FlushAgentCreateUpdate | FlushAgentDelete | FlushAgentExists => {
                ResourceKind::FlushAgent
            }
            UserCreate | UserChangePassword => ResourceKind::User,
        }
    }

    /// Operation name within its resource, e.g. `install`.
    pub fn name(self) -> &'static str {
        use Operation::*;
        match self {
            AemGetLoginPage => "get_login_page",
            AemGetInstallStatus => "get_install_status",
            AemGetPackageManagerServletStatus => "get_package_manager_servlet_status",
            PackageCreate => "create",
            PackageUpdate => "update",
            PackageDelete | FlushAgentDelete => "delete",
            PackageBuild => "build",
            PackageInstall => "install",
            PackageUninstall => "uninstall",
            PackageReplicate => "replicate",
            PackageDownload => "download",
            PackageUpload => "upload",
            PackageGetFilter => "get_filter",
            PackageListAll => "list_all",
            RepositoryBlockWrites => "block_writes",
            RepositoryUnblockWrites => "unblock_writes",
            PathActivate => "activate",
            FlushAgentCreateUpdate => "create_update",
            FlushAgentExists => "exists",
            UserCreate => "create",
            UserChangePassword => "change_password",
        }
    }

    /// Status rules for this operation.
    pub fn spec(self) -> OperationSpec {
        use Operation::*;
        let rules = match self {
            AemGetLoginPage => AEM_GET_LOGIN_PAGE,
            AemGetInstallStatus => AEM_GET_INSTALL_STATUS,
            AemGetPackageManagerServletStatus => AEM_GET_PACKAGE_MANAGER_SERVLET_STATUS,
            PackageCreate => PACKAGE_CREATE,
            PackageUpdate => PACKAGE_UPDATE,
            PackageDelete => PACKAGE_DELETE,
            PackageBuild => PACKAGE_BUILD,
            PackageInstall => PACKAGE_INSTALL,
            PackageUninstall => PACKAGE_UNINSTALL,
            PackageReplicate => PACKAGE_REPLICATE,
            PackageDownload => PACKAGE_DOWNLOAD,
            PackageUpload => PACKAGE_UPLOAD,
            PackageGetFilter => PACKAGE_GET_FILTER,
            PackageListAll => PACKAGE_LIST_ALL,
            RepositoryBlockWrites => REPOSITORY_BLOCK_WRITES,
            RepositoryUnblockWrites => REPOSITORY_UNBLOCK_WRITES,
            PathActivate => PATH_ACTIVATE,
            FlushAgentCreateUpdate => FLUSH_AGENT_CREATE_UPDATE,
            FlushAgentDelete => FLUSH_AGENT_DELETE,
            FlushAgentExists => FLUSH_AGENT_EXISTS,
            UserCreate => USER_CREATE,
            UserChangePassword => USER_CHANGE_PASSWORD,
        };
        OperationSpec { rules }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource().as_str(), self.name())
    }
}

/// How to read a response with a given HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub status: u16,
    /// Success flag for the result, unless the handler decides otherwise.
    pub success: bool,
    /// `%{name}` template filled from the call parameters.
    pub message: &'static str,
    pub handler: Handler,
    /// Fixed boolean payload, for existence checks answered by status alone.
    pub data: Option<bool>,
}

impl StatusRule {
    pub const fn ok(status: u16, message: &'static str) -> Self {
        StatusRule {
            status,
            success: true,
            message,
            handler: Handler::Simple,
            data: None,
        }
    }

    pub const fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = handler;
        self
    }

    pub const fn with_data(mut self, data: bool) -> Self {
        self.data = Some(data);
        self
    }
}

/// Static response specification of one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub rules: &'static [StatusRule],
}

impl OperationSpec {
    pub fn rule_for(&self, status: u16) -> Option<&'static StatusRule> {
        self.rules.iter().find(|rule| rule.status == status)
    }
}

macro_rules! package_message {
    ($suffix:literal) => {
        concat!("Package %{group_name}/%{package_name}-%{package_version} ", $suffix)
    };
}

const AEM_GET_LOGIN_PAGE: &[StatusRule] =
    &[StatusRule::ok(200, "Login page retrieved").with_handler(Handler::HtmlLoginPage)];
const AEM_GET_INSTALL_STATUS: &[StatusRule] = &[StatusRule::ok(
    200,
    "Install status retrieved successfully",
)
.with_handler(Handler::JsonInstallStatus)];
const AEM_GET_PACKAGE_MANAGER_SERVLET_STATUS: &[StatusRule] = &[
    StatusRule::ok(200, "Package Manager active").with_data(true),
    StatusRule::ok(404, "Package Manager inactive").with_data(false),
];

const PACKAGE_CREATE: &[StatusRule] = &[StatusRule::ok(200, package_message!("created"))];
const PACKAGE_UPDATE: &[StatusRule] = &[StatusRule::ok(200, package_message!("updated"))];
const PACKAGE_DELETE: &[StatusRule] = &[StatusRule::ok(200, package_message!("deleted"))];
const PACKAGE_BUILD: &[StatusRule] = &[StatusRule::ok(200, package_message!("built"))];
const PACKAGE_INSTALL: &[StatusRule] = &[
    StatusRule::ok(200, package_message!("installed")),
    // Service packs answer 500 while they keep installing in the background.
    StatusRule::ok(
        500,
        package_message!("installation returned %{title}: %{desc} - %{reason}"),
    )
    .with_handler(Handler::HtmlPackageServiceAllowError),
];
const PACKAGE_UNINSTALL: &[StatusRule] = &[StatusRule::ok(200, package_message!("uninstalled"))];
const PACKAGE_REPLICATE: &[StatusRule] = &[StatusRule::ok(200, package_message!("replicated"))];
const PACKAGE_DOWNLOAD: &[StatusRule] =
    &[StatusRule::ok(200, package_message!("downloaded to %{file_path}"))];
const PACKAGE_UPLOAD: &[StatusRule] = &[StatusRule::ok(200, package_message!("uploaded"))];
const PACKAGE_GET_FILTER: &[StatusRule] =
    &[StatusRule::ok(200, package_message!("filter retrieved"))
        .with_handler(Handler::JsonPackageFilter)];
const PACKAGE_LIST_ALL: &[StatusRule] = &[StatusRule::ok(
    200,
    "All packages list retrieved successfully",
)
.with_handler(Handler::XmlPackageList)];

const REPOSITORY_BLOCK_WRITES: &[StatusRule] = &[StatusRule::ok(200, "Repository writes blocked")];
const REPOSITORY_UNBLOCK_WRITES: &[StatusRule] =
    &[StatusRule::ok(200, "Repository writes unblocked")];

const PATH_ACTIVATE: &[StatusRule] = &[StatusRule::ok(200, "Path %{path} activated")];

const FLUSH_AGENT_CREATE_UPDATE: &[StatusRule] = &[
    StatusRule::ok(200, "Flush agent %{name} updated on %{run_mode}"),
    StatusRule::ok(201, "Flush agent %{name} created on %{run_mode}"),
];
const FLUSH_AGENT_DELETE: &[StatusRule] = &[
    StatusRule::ok(200, "Flush agent %{name} deleted on %{run_mode}"),
    StatusRule::ok(204, "Flush agent %{name} deleted on %{run_mode}"),
    StatusRule::ok(404, "Flush agent %{name} not found on %{run_mode}"),
];
const FLUSH_AGENT_EXISTS: &[StatusRule] = &[
    StatusRule::ok(200, "Flush agent %{name} exists on %{run_mode}").with_data(true),
    StatusRule::ok(404, "Flush agent %{name} not found on %{run_mode}").with_data(false),
];

const USER_CREATE: &[StatusRule] = &[StatusRule::ok(
    201,
    "User %{name} created at %{path}/%{authorizable_id}",
)
.with_handler(Handler::HtmlAuthorizableId)];
const USER_CHANGE_PASSWORD: &[StatusRule] = &[StatusRule::ok(
    200,
    "User %{user} password changed",
)
.with_handler(Handler::HtmlChangePassword)];
