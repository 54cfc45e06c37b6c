pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod info;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod samplers;

pub use config::AgentConfig;
pub use error::AgentError;
pub use lifecycle::Agent;
pub use metrics::{MetricFamily, MetricRecord};
