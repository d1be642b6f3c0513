//! HTTP clients for the rental backend's payments and units resources

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use auth::{ChainedTokens, EnvToken, FileTokenStore, StaticToken, TokenProvider};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use services::{PaymentApi, PaymentClient, UnitApi, UnitClient, UnitFilters};
