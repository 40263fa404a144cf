use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub invoice_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<i64>,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Checkout link issued by the payment provider for one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub order_code: i64,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Cancelled,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestInfo {
    #[serde(default)]
    pub order_code: Option<i64>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_code: i64,
    pub invoice_id: i64,
}

/// The invoice fields the payment flow needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceRef {
    pub invoice_id: i64,
    pub total_amount: i64,
}
