//! Response handlers: turn a raw response into an [`AemResult`].
//!
//! Each handler gets the response, the status rule that matched it and the
//! call parameters. Handlers prefer returning a non-success result; only the
//! change-password handler raises, because an empty or rejected body leaves
//! nothing meaningful to return.

use tracing::debug;

use crate::error::{AemError, Result};
use crate::markup;
use crate::operation::StatusRule;
use crate::params::CallParams;
use crate::response::Response;
use crate::result::{AemResult, ResultData};
use crate::sanitize::Malformed;

/// Post-processing applied to a response whose status matched a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Message from the rule's template; data from the rule's fixed value.
    Simple,
    HtmlAuthorizableId,
    HtmlPackageServiceAllowError,
    HtmlChangePassword,
    XmlPackageList,
    JsonPackageFilter,
    HtmlLoginPage,
    JsonInstallStatus,
}

impl Handler {
    pub fn handle(
        self,
        response: Response,
        rule: &StatusRule,
        params: &CallParams,
    ) -> Result<AemResult> {
        debug!(handler = ?self, status = response.status_code, "handling response");
        match self {
            Handler::Simple => Ok(simple(response, rule, params)),
            Handler::HtmlAuthorizableId => Ok(html_authorizable_id(response, rule, params)),
            Handler::HtmlPackageServiceAllowError => {
                Ok(html_package_service_allow_error(response, rule, params))
            }
            Handler::HtmlChangePassword => html_change_password(response, rule, params),
            Handler::XmlPackageList => Ok(xml_package_list(response, rule, params)),
            Handler::JsonPackageFilter => Ok(json_package_filter(response, rule, params)),
            Handler::HtmlLoginPage => Ok(html_login_page(response, rule, params)),
            Handler::JsonInstallStatus => Ok(json_install_status(response, rule, params)),
        }
    }
}

fn simple(response: Response, rule: &StatusRule, params: &CallParams) -> AemResult {
    let data = rule.data.map(ResultData::Bool).unwrap_or_default();
    AemResult::new(params.render(rule.message))
        .with_success(rule.success)
        .with_data(data)
        .with_response(response)
}

/// Read the ID of a newly created user or group from the page title,
/// e.g. `Content created /home/users/a/abc123` with path `/home/users/a`.
pub fn html_authorizable_id(
    response: Response,
    rule: &StatusRule,
    params: &CallParams,
) -> AemResult {
    let title = {
        let sanitized = Malformed::UnterminatedImg.strip(&response.body);
        markup::parse_html(&sanitized).and_then(|html| markup::first_text(&html, &["title"]))
    };

    let Some(title) = title else {
        return AemResult::failure(format!(
            "Unable to read authorizable ID for {}, response has no title",
            params.get_or_empty("path")
        ))
        .with_response(response);
    };

    let prefix = format!("Content created {}", params.get_or_empty("path"));
    let remainder = title.replacen(&prefix, "", 1);
    let authorizable_id = remainder.strip_prefix('/').unwrap_or(&remainder);

    let params = params.clone().with("authorizable_id", authorizable_id);
    AemResult::new(params.render(rule.message))
        .with_success(rule.success)
        .with_response(response)
}

/// Surface the error page AEM returns while a hotfix or service pack is
/// still installing in the background. The rule decides the success flag.
pub fn html_package_service_allow_error(
    response: Response,
    rule: &StatusRule,
    params: &CallParams,
) -> AemResult {
    let (title, desc, reason) = match markup::parse_html(&response.body) {
        Some(html) => (
            markup::text_or_empty(&html, &["title"]),
            markup::text_or_empty(&html, &["p"]),
            markup::text_or_empty(&html, &["pre"]),
        ),
        None => Default::default(),
    };

    let params = params
        .clone()
        .with("title", title)
        .with("desc", desc)
        .with("reason", reason);
    AemResult::new(params.render(rule.message))
        .with_success(rule.success)
        .with_response(response)
}

const PASSWORD_CHANGED: &str = "Password successfully changed.";

/// Inspect the change-password page. An empty body means the user does not
/// exist; any table text other than the success phrase is the failure reason.
pub fn html_change_password(
    response: Response,
    rule: &StatusRule,
    params: &CallParams,
) -> Result<AemResult> {
    if response.body.is_empty() {
        let result = AemResult::failure(
            "Failed to change password: Response body is empty, user likely does not exist.",
        )
        .with_response(response);
        return Err(AemError::operation(result));
    }

    let page = {
        let without_inputs = Malformed::UnterminatedInput.strip(&response.body);
        let sanitized = Malformed::LessThanZero.strip(&without_inputs);
        markup::parse_html(&sanitized).map(|html| {
            (
                markup::text_or_empty(&html, &["body", "div", "table", "tr", "td", "b"]),
                markup::text_or_empty(&html, &["body", "div", "table", "tr", "td", "font"]),
            )
        })
    };

    let failure = match page {
        None => "Failed to change password: unable to parse response page".to_string(),
        Some((user, desc)) if desc == PASSWORD_CHANGED => {
            let params = params.clone().with("user", user);
            return Ok(AemResult::new(params.render(rule.message))
                .with_success(rule.success)
                .with_response(response));
        }
        Some((_, desc)) if desc.trim().is_empty() => {
            "Failed to change password: response page has no status text".to_string()
        }
        Some((_, desc)) => desc,
    };
    Err(AemError::operation(
        AemResult::failure(failure).with_response(response),
    ))
}

/// Check the package manager's `<crx><response><status code="200">ok</status>`
/// envelope and keep the `<packages>` subtree as the result data.
pub fn xml_package_list(response: Response, rule: &StatusRule, params: &CallParams) -> AemResult {
    let xml = markup::parse(&response.body);

    let status = xml
        .as_ref()
        .and_then(|xml| markup::first_element(xml, &["crx", "response", "status"]));
    let status_code = status
        .and_then(|s| s.attributes.get("code"))
        .map(String::as_str)
        .unwrap_or("");
    let status_text = status.and_then(markup::own_text).unwrap_or("");

    if status_code == "200" && status_text == "ok" {
        let packages = xml
            .as_ref()
            .and_then(|xml| markup::first_element(xml, &["crx", "response", "data", "packages"]))
            .cloned()
            .map(ResultData::Document)
            .unwrap_or_default();
        AemResult::new(params.render(rule.message))
            .with_success(rule.success)
            .with_data(packages)
            .with_response(response)
    } else {
        AemResult::failure(format!(
            "Unable to retrieve package list, getting status code {} and status text {}",
            status_code, status_text
        ))
        .with_response(response)
    }
}

/// Collect the `root` of every filter entry in the package definition JSON,
/// in document order.
pub fn json_package_filter(
    response: Response,
    rule: &StatusRule,
    params: &CallParams,
) -> AemResult {
    match serde_json::from_str::<serde_json::Value>(&response.body) {
        Ok(serde_json::Value::Object(entries)) => {
            let roots = entries
                .values()
                .filter_map(|entry| entry.get("root").and_then(|r| r.as_str()))
                .map(str::to_string)
                .collect();
            AemResult::new(params.render(rule.message))
                .with_success(rule.success)
                .with_data(ResultData::Strings(roots))
                .with_response(response)
        }
        _ => AemResult::failure(format!(
            "Unable to read filter of package {}",
            params.render("%{group_name}/%{package_name}-%{package_version}")
        ))
        .with_data(ResultData::Strings(Vec::new()))
        .with_response(response),
    }
}

/// Marker present on the login page once the quickstart has finished
/// starting and serves the real page rather than a placeholder.
const LOGIN_PAGE_READY: &str = "QUICKSTART_HOMEPAGE";

/// The login page answers `200` while AEM is still starting; readiness is the
/// marker in its body.
pub fn html_login_page(response: Response, rule: &StatusRule, params: &CallParams) -> AemResult {
    let ready = response.body.contains(LOGIN_PAGE_READY);
    AemResult::new(params.render(rule.message))
        .with_success(rule.success)
        .with_data(ResultData::Bool(ready))
        .with_response(response)
}

/// Read `installstatus.jsp`: installation is finished when the status says
/// so and no items are pending.
pub fn json_install_status(
    response: Response,
    rule: &StatusRule,
    params: &CallParams,
) -> AemResult {
    let status = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| body.get("status").cloned());

    let Some(status) = status else {
        return AemResult::failure("Unable to read install status").with_response(response);
    };

    let finished = status.get("finished").and_then(|f| f.as_bool()).unwrap_or(false);
    let item_count = status.get("itemCount").and_then(|c| c.as_i64()).unwrap_or(0);
    AemResult::new(params.render(rule.message))
        .with_success(rule.success)
        .with_data(ResultData::Bool(finished && item_count == 0))
        .with_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(message: &'static str) -> StatusRule {
        StatusRule::ok(200, message)
    }

    #[test]
    fn test_authorizable_id_from_title() {
        let body = r#"<html><head><title>Content created /home/users/a/abc123</title></head>
<body><img src="/libs/x.png" alt="x">
<p>ok</p></body></html>"#;
        let params = CallParams::new().with("path", "/home/users/a").with("name", "jdoe");
        let result = html_authorizable_id(
            Response::new(201, body),
            &rule("User %{name} created at %{path}/%{authorizable_id}"),
            &params,
        );
        assert!(result.is_success());
        assert_eq!(result.message(), "User jdoe created at /home/users/a/abc123");
    }

    #[test]
    fn test_authorizable_id_without_prefix_is_remainder() {
        let body = "<html><head><title>Something else</title></head></html>";
        let params = CallParams::new().with("path", "/home/users/a");
        let result = html_authorizable_id(
            Response::new(201, body),
            &rule("id=%{authorizable_id}"),
            &params,
        );
        assert!(result.is_success());
        assert_eq!(result.message(), "id=Something else");
    }

    #[test]
    fn test_authorizable_id_missing_title_fails() {
        let params = CallParams::new().with("path", "/home/users/a");
        let result = html_authorizable_id(
            Response::new(201, "<html><body/></html>"),
            &rule("id=%{authorizable_id}"),
            &params,
        );
        assert!(!result.is_success());
        assert!(result.message().contains("/home/users/a"));
    }

    #[test]
    fn test_package_service_error_fields() {
        let body = "<html><head><title>500 Error</title></head>\
                    <body><p>Install failed</p><pre>java.lang.Exception</pre></body></html>";
        let result = html_package_service_allow_error(
            Response::new(500, body),
            &StatusRule::ok(500, "%{title} - %{desc} - %{reason}")
                .with_handler(Handler::HtmlPackageServiceAllowError),
            &CallParams::new(),
        );
        assert!(result.is_success());
        assert_eq!(result.message(), "500 Error - Install failed - java.lang.Exception");
    }

    #[test]
    fn test_package_service_error_tolerates_missing_nodes() {
        let result = html_package_service_allow_error(
            Response::new(500, "<html><head><title>Busy</title></head></html>"),
            &rule("[%{title}][%{desc}][%{reason}]"),
            &CallParams::new(),
        );
        assert_eq!(result.message(), "[Busy][][]");
    }

    #[test]
    fn test_change_password_empty_body_raises() {
        let err = html_change_password(
            Response::new(200, ""),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("user likely does not exist"));
        assert!(err.result().is_some());
    }

    const PASSWORD_PAGE: &str = r#"<html><head><script>if (x < 0) {}</script></head>
<body><div><table><tr><td><b>jdoe</b><font>%DESC%</font>
<input type="hidden" name="a">
</td></tr></table></div></body></html>"#;

    #[test]
    fn test_change_password_success() {
        let body = PASSWORD_PAGE.replace("%DESC%", "Password successfully changed.");
        let result = html_change_password(
            Response::new(200, body),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap();
        assert!(result.is_success());
        assert_eq!(result.message(), "User jdoe password changed");
    }

    #[test]
    fn test_change_password_rejection_raises_page_text() {
        let body = PASSWORD_PAGE.replace("%DESC%", "Old password does not match.");
        let err = html_change_password(
            Response::new(200, body),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Old password does not match.");
    }

    #[test]
    fn test_change_password_page_with_nbsp() {
        let body = "<html><body><div><table><tr><td><b>jdoe</b>&nbsp;\
                    <font>Password successfully changed.</font>\
                    </td></tr></table></div></body></html>";
        let result = html_change_password(
            Response::new(200, body),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap();
        assert_eq!(result.message(), "User jdoe password changed");
    }

    #[test]
    fn test_change_password_unparseable_page_names_the_problem() {
        let err = html_change_password(
            Response::new(200, "<html><body><div>unclosed"),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AemError::Operation { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to change password: unable to parse response page"
        );
        let status = err.result().and_then(|r| r.response()).map(|r| r.status_code);
        assert_eq!(status, Some(200));
    }

    #[test]
    fn test_change_password_blank_status_text_is_not_blank_error() {
        let body = PASSWORD_PAGE.replace("%DESC%", "");
        let err = html_change_password(
            Response::new(200, body),
            &rule("User %{user} password changed"),
            &CallParams::new(),
        )
        .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_package_list_ok_keeps_packages_subtree() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<crx version="1.4.1" user="admin" workspace="crx.default">
  <request><param name="cmd" value="ls"/></request>
  <response>
    <data>
      <packages>
        <package><group>g</group><name>p</name><version>1.0</version></package>
      </packages>
    </data>
    <status code="200">ok</status>
  </response>
</crx>"#;
        let result =
            xml_package_list(Response::new(200, body), &rule("listed"), &CallParams::new());
        assert!(result.is_success());
        let packages = result.data().as_document().unwrap();
        assert_eq!(packages.name, "packages");
        assert_eq!(markup::child_elements(packages).count(), 1);
    }

    #[test]
    fn test_package_list_bad_status_fails() {
        let body = r#"<crx><response><status code="500">error</status></response></crx>"#;
        let result =
            xml_package_list(Response::new(200, body), &rule("listed"), &CallParams::new());
        assert!(!result.is_success());
        assert_eq!(
            result.message(),
            "Unable to retrieve package list, getting status code 500 and status text error"
        );
        assert_eq!(result.data(), &ResultData::None);
    }

    #[test]
    fn test_package_filter_roots_in_order() {
        let body = r#"{"jcr:primaryType":"nt:unstructured",
            "f0":{"jcr:primaryType":"nt:unstructured","root":"/apps/b","rules":[]},
            "f1":{"jcr:primaryType":"nt:unstructured","root":"/apps/a","rules":[]}}"#;
        let result =
            json_package_filter(Response::new(200, body), &rule("filter"), &CallParams::new());
        assert!(result.is_success());
        assert_eq!(
            result.data().as_strings().unwrap(),
            &["/apps/b".to_string(), "/apps/a".to_string()]
        );
    }

    #[test]
    fn test_package_filter_garbage_is_failure() {
        let body = "<html/>";
        let result =
            json_package_filter(Response::new(200, body), &rule("filter"), &CallParams::new());
        assert!(!result.is_success());
        assert_eq!(result.data().as_strings().map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_login_page_ready_on_marker() {
        let starting = html_login_page(
            Response::new(200, "<html><body>Starting</body></html>"),
            &rule("Login page retrieved"),
            &CallParams::new(),
        );
        assert!(starting.is_success());
        assert_eq!(starting.data(), &ResultData::Bool(false));

        let ready = html_login_page(
            Response::new(200, "<html><!-- QUICKSTART_HOMEPAGE --></html>"),
            &rule("Login page retrieved"),
            &CallParams::new(),
        );
        assert_eq!(ready.data(), &ResultData::Bool(true));
    }

    #[test]
    fn test_install_status_finished_only_without_pending_items() {
        let read = |body: &str| {
            json_install_status(
                Response::new(200, body),
                &rule("Install status retrieved successfully"),
                &CallParams::new(),
            )
        };
        let done = read(r#"{"status":{"finished":true,"itemCount":0}}"#);
        assert!(done.is_success());
        assert_eq!(done.data(), &ResultData::Bool(true));

        let pending = read(r#"{"status":{"finished":true,"itemCount":3}}"#);
        assert_eq!(pending.data(), &ResultData::Bool(false));

        let running = read(r#"{"status":{"finished":false,"itemCount":0}}"#);
        assert_eq!(running.data(), &ResultData::Bool(false));
    }

    #[test]
    fn test_install_status_unreadable_body_fails() {
        let result = json_install_status(
            Response::new(200, "<html>busy</html>"),
            &rule("Install status retrieved successfully"),
            &CallParams::new(),
        );
        assert!(!result.is_success());
        assert_eq!(result.message(), "Unable to read install status");
    }
}
