//! Dispatcher flush agents under `/etc/replication/agents.{run_mode}`.

use crate::client::AemClient;
use crate::error::Result;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::result::AemResult;

pub struct FlushAgent<'a> {
    client: &'a AemClient,
    run_mode: String,
    name: String,
}

impl<'a> FlushAgent<'a> {
    /// `run_mode` is `author` or `publish`.
    pub fn new(client: &'a AemClient, run_mode: &str, name: &str) -> Self {
        FlushAgent {
            client,
            run_mode: run_mode.to_string(),
            name: name.to_string(),
        }
    }

    fn params(&self) -> CallParams {
        CallParams::new()
            .with("run_mode", &self.run_mode)
            .with("name", &self.name)
    }

    /// Create the agent, or overwrite it if present. It invalidates
    /// `{dest_base_url}/dispatcher/invalidate.cache`.
    pub async fn create_update(
        &self,
        title: &str,
        description: &str,
        dest_base_url: &str,
    ) -> Result<AemResult> {
        let params = self
            .params()
            .with("title", title)
            .with("description", description)
            .with("dest_base_url", dest_base_url);
        self.client.call(Operation::FlushAgentCreateUpdate, &params).await
    }

    /// Delete the agent. A missing agent is reported, not raised.
    pub async fn delete(&self) -> Result<AemResult> {
        self.client.call(Operation::FlushAgentDelete, &self.params()).await
    }

    /// `Bool` data: whether the agent node exists.
    pub async fn exists(&self) -> Result<AemResult> {
        self.client.call(Operation::FlushAgentExists, &self.params()).await
    }
}
