//! Hosted-backend adapters for the project-details session: REST/storage via
//! [`RestBackend`] and live inserts via [`RealtimeClient`].

pub mod config;
pub mod error;
pub mod realtime;
pub mod rest;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use realtime::RealtimeClient;
pub use rest::RestBackend;
