pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod routes;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use config::Config;

use pipeline::ReportGenerator;

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ReportGenerator>,
}
