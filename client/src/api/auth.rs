use crate::{
    api::ApiClient,
    auth::Role,
    error::Result,
    models::user::{LoginRequest, LoginResponse},
};

impl ApiClient {
    /// Exchanges credentials for a token and stores the new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Role> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post("auth/login", &req).await?;
        self.context().login(resp.role, resp.token).await?;
        Ok(resp.role)
    }

    pub async fn logout(&self) -> Result<()> {
        self.context().logout().await
    }
}
