pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifetime;
pub mod models;
pub mod payment;
pub mod scheduling;

pub use api::ApiClient;
pub use auth::{AppContext, Role};
pub use error::{ClientError, Result};
