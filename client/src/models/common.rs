use serde::Deserialize;

/// Success envelope shared by every endpoint: the payload lives under `data`.
///
/// `data` is optional because delete endpoints answer with an empty envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure envelope returned with a non-2xx status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}
