use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("No {weekday} left to schedule in {month} {year}")]
    EmptyRecurrence {
        weekday: time::Weekday,
        month: time::Month,
        year: i32,
    },

    #[error("Session expired or not logged in")]
    Unauthorized,

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Message shown to the user in an alert banner.
    ///
    /// Server-reported failures and unreachable-network failures are presented
    /// the same way; only validation messages get their field breakdown.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(e) => e
                .field_errors()
                .into_iter()
                .map(|(field, errors)| {
                    let msgs: Vec<String> = errors
                        .iter()
                        .map(|err| match &err.message {
                            Some(m) => m.to_string(),
                            None => err.code.to_string(),
                        })
                        .collect();
                    format!("{}: {}", field, msgs.join(", "))
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
