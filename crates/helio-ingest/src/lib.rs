pub mod config;
pub mod error;
pub mod local;
pub mod requests;
pub mod routes;
pub mod secrets;

pub use config::ServiceConfig;
pub use routes::{router, AppState};
