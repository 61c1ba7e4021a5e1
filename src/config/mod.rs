pub mod deployment;
pub mod settings;

pub use settings::{BackendSettings, GatewaySettings, Settings};
