use crate::client::AemClient;
use crate::error::Result;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::result::AemResult;

/// A content tree rooted at one repository path.
pub struct Path<'a> {
    client: &'a AemClient,
    path: String,
}

impl<'a> Path<'a> {
    pub fn new(client: &'a AemClient, path: &str) -> Self {
        Path {
            client,
            path: path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Tree-activate the path to the publish tier.
    ///
    /// `ignore_deactivated` skips nodes that were explicitly deactivated;
    /// `modified_only` skips nodes unchanged since their last activation.
    pub async fn activate(
        &self,
        ignore_deactivated: bool,
        modified_only: bool,
    ) -> Result<AemResult> {
        let params = CallParams::new()
            .with("path", &self.path)
            .with("ignore_deactivated", ignore_deactivated)
            .with("modified_only", modified_only);
        self.client.call(Operation::PathActivate, &params).await
    }
}
