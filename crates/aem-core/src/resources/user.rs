use crate::client::AemClient;
use crate::error::Result;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::result::AemResult;

/// A repository user under an intermediate path such as `/home/users/a`.
pub struct User<'a> {
    client: &'a AemClient,
    path: String,
    name: String,
}

impl<'a> User<'a> {
    pub fn new(client: &'a AemClient, path: &str, name: &str) -> Self {
        User {
            client,
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    fn params(&self) -> CallParams {
        CallParams::new()
            .with("path", &self.path)
            .with("name", &self.name)
    }

    /// Create the user. The message carries the assigned authorizable id.
    pub async fn create(&self, password: &str) -> Result<AemResult> {
        let params = self.params().with("password", password);
        self.client.call(Operation::UserCreate, &params).await
    }

    /// Change the password.
    ///
    /// Fails with [`AemError::Operation`](crate::AemError::Operation) when the
    /// server rejects the change or the user does not exist.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<AemResult> {
        let params = self
            .params()
            .with("old_password", old_password)
            .with("new_password", new_password);
        self.client.call(Operation::UserChangePassword, &params).await
    }
}
