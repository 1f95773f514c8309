use crate::client::AemClient;
use crate::error::Result;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::result::AemResult;

/// Repository-wide write switch.
pub struct Repository<'a> {
    client: &'a AemClient,
}

impl<'a> Repository<'a> {
    pub fn new(client: &'a AemClient) -> Self {
        Repository { client }
    }

    /// Put the repository into read-only mode.
    pub async fn block_writes(&self) -> Result<AemResult> {
        self.client
            .call(Operation::RepositoryBlockWrites, &CallParams::new())
            .await
    }

    pub async fn unblock_writes(&self) -> Result<AemResult> {
        self.client
            .call(Operation::RepositoryUnblockWrites, &CallParams::new())
            .await
    }
}
