//! HTTP transport against a live AEM instance
//!
//! Maps each [`Operation`] to a [`RequestPlan`] (method, path, query, form,
//! upload/download file) and executes it with basic auth.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Method;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::response::Response;
use crate::transport::Transport;

const PACKMGR_SERVICE: &str = "/crx/packmgr/service.jsp";
const PACKMGR_JSON: &str = "/crx/packmgr/service/.json/etc/packages";
const REPOSITORY_JMX: &str = "/system/console/jmx/com.adobe.granite:type=Repository/op";
const TREE_ACTIVATION: &str = "/etc/replication/treeactivation.html";
const AUTHORIZABLES: &str = "/libs/granite/security/post/authorizables";
const SET_PASSWORD: &str = "/crx/explorer/ui/setpassword.jsp";
const LOGIN_PAGE: &str = "/libs/granite/core/content/login.html";
const INSTALL_STATUS: &str = "/crx/packmgr/installstatus.jsp";
const PACKMGR_SCRIPT: &str = "/crx/packmgr/service/script.html";

/// Request to send for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    /// Package file sent as multipart `file` part, with `form` as text parts.
    pub upload: Option<PathBuf>,
    /// Successful response bodies are written here instead of returned.
    pub download: Option<PathBuf>,
}

impl RequestPlan {
    fn new(method: Method, path: String) -> Self {
        RequestPlan {
            method,
            path,
            query: Vec::new(),
            form: Vec::new(),
            upload: None,
            download: None,
        }
    }

    fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    fn form(mut self, name: &str, value: &str) -> Self {
        self.form.push((name.to_string(), value.to_string()));
        self
    }
}

/// Fetches named params, reporting which operation needed a missing one.
struct Args<'a> {
    operation: Operation,
    params: &'a CallParams,
}

impl<'a> Args<'a> {
    fn req(&self, name: &str) -> Result<&'a str, TransportError> {
        self.params
            .get(name)
            .ok_or_else(|| TransportError::MissingParam {
                operation: self.operation.to_string(),
                param: name.to_string(),
            })
    }

    fn flag(&self, name: &str) -> &'static str {
        if self.params.get_bool(name) {
            "true"
        } else {
            "false"
        }
    }

    /// `{group}/{name}-{version}.zip`
    fn package_file(&self) -> Result<String, TransportError> {
        Ok(format!(
            "{}/{}-{}.zip",
            self.req("group_name")?,
            self.req("package_name")?,
            self.req("package_version")?
        ))
    }

    fn agent_path(&self) -> Result<String, TransportError> {
        Ok(format!(
            "/etc/replication/agents.{}/{}",
            self.req("run_mode")?,
            self.req("name")?
        ))
    }
}

/// Build the request plan for an operation.
pub fn plan(operation: Operation, params: &CallParams) -> Result<RequestPlan, TransportError> {
    use Operation::*;
    let args = Args { operation, params };

    let package_cmd = |cmd: &str| -> Result<RequestPlan, TransportError> {
        Ok(
            RequestPlan::new(Method::POST, format!("{}/{}", PACKMGR_JSON, args.package_file()?))
                .query("cmd", cmd),
        )
    };

    let plan = match operation {
        AemGetLoginPage => RequestPlan::new(Method::GET, LOGIN_PAGE.into()),
        AemGetInstallStatus => RequestPlan::new(Method::GET, INSTALL_STATUS.into()),
        AemGetPackageManagerServletStatus => {
            RequestPlan::new(Method::GET, PACKMGR_SCRIPT.into())
        }
        PackageCreate => RequestPlan::new(Method::POST, "/crx/packmgr/service/exec.json".into())
            .query("cmd", "create")
            .form("groupName", args.req("group_name")?)
            .form("packageName", args.req("package_name")?)
            .form("packageVersion", args.req("package_version")?),
        PackageUpdate => RequestPlan::new(Method::POST, "/crx/packmgr/update.jsp".into())
            .form("path", &format!("/etc/packages/{}", args.package_file()?))
            .form("groupName", args.req("group_name")?)
            .form("packageName", args.req("package_name")?)
            .form("version", args.req("package_version")?)
            .form("filter", args.req("filter")?)
            .form("_charset_", "UTF-8"),
        PackageDelete => package_cmd("delete")?,
        PackageBuild => package_cmd("build")?,
        PackageInstall => package_cmd("install")?.query("recursive", args.flag("recursive")),
        PackageUninstall => package_cmd("uninstall")?,
        PackageReplicate => package_cmd("replicate")?,
        PackageDownload => {
            let mut plan =
                RequestPlan::new(Method::GET, format!("/etc/packages/{}", args.package_file()?));
            plan.download = Some(PathBuf::from(args.req("file_path")?).join(format!(
                "{}-{}.zip",
                args.req("package_name")?,
                args.req("package_version")?
            )));
            plan
        }
        PackageUpload => {
            let mut plan = RequestPlan::new(Method::POST, PACKMGR_SERVICE.into())
                .form("name", args.req("package_name")?)
                .form("force", args.flag("force"))
                .form("install", "false");
            plan.upload = Some(PathBuf::from(args.req("file_path")?).join(format!(
                "{}-{}.zip",
                args.req("package_name")?,
                args.req("package_version")?
            )));
            plan
        }
        PackageGetFilter => RequestPlan::new(
            Method::GET,
            format!(
                "/etc/packages/{}/jcr:content/vlt:definition/filter.tidy.2.json",
                args.package_file()?
            ),
        ),
        PackageListAll => RequestPlan::new(Method::GET, PACKMGR_SERVICE.into()).query("cmd", "ls"),
        RepositoryBlockWrites => RequestPlan::new(
            Method::POST,
            format!("{}/blockRepositoryWrites/", REPOSITORY_JMX),
        ),
        RepositoryUnblockWrites => RequestPlan::new(
            Method::POST,
            format!("{}/unblockRepositoryWrites/", REPOSITORY_JMX),
        ),
        PathActivate => RequestPlan::new(Method::POST, TREE_ACTIVATION.into())
            .form("cmd", "activate")
            .form("path", args.req("path")?)
            .form("ignoredeactivated", args.flag("ignore_deactivated"))
            .form("onlymodified", args.flag("modified_only")),
        FlushAgentCreateUpdate => {
            let transport_uri =
                format!("{}/dispatcher/invalidate.cache", args.req("dest_base_url")?);
            RequestPlan::new(Method::POST, args.agent_path()?)
                .form("jcr:primaryType", "cq:Page")
                .form("jcr:content/jcr:title", args.req("title")?)
                .form("jcr:content/jcr:description", args.req("description")?)
                .form("jcr:content/cq:template", "/libs/cq/replication/templates/agent")
                .form(
                    "jcr:content/sling:resourceType",
                    "/libs/cq/replication/components/agent",
                )
                .form("jcr:content/serializationType", "flush")
                .form("jcr:content/transportUri", &transport_uri)
                .form("jcr:content/protocolHTTPMethod", "GET")
                .form("jcr:content/protocolHTTPHeaders", "CQ-Action:{action}")
                .form("jcr:content/protocolHTTPHeaders", "CQ-Handle:{path}")
                .form("jcr:content/protocolHTTPHeaders", "CQ-Path:{path}")
                .form("jcr:content/protocolHTTPHeaders@TypeHint", "String[]")
                .form("jcr:content/enabled", "true")
        }
        FlushAgentDelete => RequestPlan::new(Method::DELETE, args.agent_path()?),
        FlushAgentExists => RequestPlan::new(Method::HEAD, args.agent_path()?),
        UserCreate => RequestPlan::new(Method::POST, AUTHORIZABLES.into())
            .form("createUser", "")
            .form("authorizableId", args.req("name")?)
            .form("rep:password", args.req("password")?)
            .form("intermediatePath", args.req("path")?),
        UserChangePassword => RequestPlan::new(Method::POST, SET_PASSWORD.into())
            .form("old", args.req("old_password")?)
            .form("plain", args.req("new_password")?)
            .form("verify", args.req("new_password")?)
            .form("Path", &format!("{}/{}", args.req("path")?, args.req("name")?)),
    };

    Ok(plan)
}

/// reqwest-backed transport
pub struct HttpTransport {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("aemctl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpTransport {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send(&self, plan: &RequestPlan) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{}", self.config.base(), plan.path);
        let url =
            reqwest::Url::parse(&url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut request = self
            .http_client
            .request(plan.method.clone(), url)
            .basic_auth(&self.config.username, Some(&self.config.password));

        if !plan.query.is_empty() {
            request = request.query(&plan.query);
        }

        if let Some(upload) = &plan.upload {
            let bytes = tokio::fs::read(upload).await?;
            let file_name = upload
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "package.zip".to_string());
            let mut form = multipart::Form::new().part(
                "file",
                multipart::Part::bytes(bytes).file_name(file_name),
            );
            for (name, value) in &plan.form {
                form = form.text(name.clone(), value.clone());
            }
            request = request.multipart(form);
        } else if !plan.form.is_empty() {
            request = request.form(&plan.form);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        operation: Operation,
        params: &CallParams,
    ) -> Result<Response, TransportError> {
        let plan = plan(operation, params)?;
        debug!(operation = %operation, method = %plan.method, path = %plan.path, "sending request");

        let response = self.send(&plan).await?;
        let status_code = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = match &plan.download {
            Some(target) if response.status().is_success() => {
                let bytes = response.bytes().await?;
                tokio::fs::write(target, &bytes).await?;
                info!(
                    operation = %operation,
                    path = %target.display(),
                    bytes = bytes.len(),
                    "downloaded"
                );
                String::new()
            }
            _ => response.text().await?,
        };

        let response = headers
            .iter()
            .fold(Response::new(status_code, body), |response, (name, value)| {
                response.with_header(name, value)
            });
        debug!(
            operation = %operation,
            status = status_code,
            content_type = response.header("content-type").unwrap_or(""),
            "received response"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_params() -> CallParams {
        CallParams::new()
            .with("group_name", "shinesolutions")
            .with("package_name", "aem-password-reset")
            .with("package_version", "1.0.0")
    }

    #[test]
    fn test_install_plan() {
        let params = package_params().with("recursive", true);
        let plan = plan(Operation::PackageInstall, &params).unwrap();
        assert_eq!(plan.method, Method::POST);
        assert_eq!(
            plan.path,
            "/crx/packmgr/service/.json/etc/packages/shinesolutions/aem-password-reset-1.0.0.zip"
        );
        assert_eq!(
            plan.query,
            vec![
                ("cmd".to_string(), "install".to_string()),
                ("recursive".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn test_upload_plan_points_at_package_file() {
        let params = package_params().with("file_path", "/tmp/pkgs").with("force", false);
        let plan = plan(Operation::PackageUpload, &params).unwrap();
        assert_eq!(
            plan.upload,
            Some(PathBuf::from("/tmp/pkgs/aem-password-reset-1.0.0.zip"))
        );
        assert!(plan.form.contains(&("force".to_string(), "false".to_string())));
    }

    #[test]
    fn test_missing_param_is_reported() {
        let err = plan(Operation::PackageBuild, &CallParams::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing call parameter `group_name` for package.build"
        );
    }

    #[test]
    fn test_flush_agent_paths() {
        let params = CallParams::new()
            .with("run_mode", "author")
            .with("name", "some-flush-agent");
        let plan = plan(Operation::FlushAgentExists, &params).unwrap();
        assert_eq!(plan.method, Method::HEAD);
        assert_eq!(plan.path, "/etc/replication/agents.author/some-flush-agent");
    }

    #[test]
    fn test_aem_readiness_plans_are_plain_gets() {
        let login = plan(Operation::AemGetLoginPage, &CallParams::new()).unwrap();
        assert_eq!(login.method, Method::GET);
        assert_eq!(login.path, "/libs/granite/core/content/login.html");

        let status = plan(Operation::AemGetInstallStatus, &CallParams::new()).unwrap();
        assert_eq!(status.path, "/crx/packmgr/installstatus.jsp");

        let servlet =
            plan(Operation::AemGetPackageManagerServletStatus, &CallParams::new()).unwrap();
        assert_eq!(servlet.path, "/crx/packmgr/service/script.html");
        assert!(servlet.query.is_empty() && servlet.form.is_empty());
    }

    #[test]
    fn test_transport_builds_from_config() {
        let transport = HttpTransport::new(ClientConfig::new("http://localhost:4502")).unwrap();
        assert_eq!(transport.config().base(), "http://localhost:4502");
    }

    #[tokio::test]
    async fn test_unreachable_instance_is_transport_error() {
        let transport =
            HttpTransport::new(ClientConfig::new("http://127.0.0.1:9").with_timeout(2)).unwrap();
        let result = transport
            .call(Operation::PackageListAll, &CallParams::new())
            .await;
        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}
