use async_trait::async_trait;

use crate::{
    api::ApiClient,
    auth::Role,
    error::{ClientError, Result},
    models::payment::{CreatePaymentRequest, PaymentLink, PaymentRequestInfo, VerifyPaymentRequest},
    payment::PaymentGateway,
};

impl ApiClient {
    /// Payment endpoints live under the caller's role, e.g. `receptionist/payments`.
    async fn payments_prefix(&self) -> Result<String> {
        let role: Role = self.context().role().await.ok_or(ClientError::Unauthorized)?;
        if !role.can_take_payment() {
            return Err(ClientError::Forbidden(format!("{role} cannot take payments")));
        }
        Ok(format!("{}/payments", role.api_segment()))
    }
}

#[async_trait]
impl PaymentGateway for ApiClient {
    async fn create_link(&self, req: &CreatePaymentRequest) -> Result<PaymentLink> {
        let prefix = self.payments_prefix().await?;
        self.post(&format!("{prefix}/create"), req).await
    }

    async fn order_status(&self, order_code: i64) -> Result<PaymentRequestInfo> {
        let prefix = self.payments_prefix().await?;
        self.get(&format!("{prefix}/{order_code}"), &[]).await
    }

    async fn verify(&self, req: &VerifyPaymentRequest) -> Result<()> {
        let prefix = self.payments_prefix().await?;
        self.post_discard(&format!("{prefix}/verify"), req).await
    }
}
