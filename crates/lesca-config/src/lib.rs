//! Environment-driven configuration, mirroring the env-var loading pattern
//! used elsewhere in the workspace: a small typed builder over `std::env`
//! rather than a config-file parser.

pub mod env;
pub mod service;

pub use env::EnvConfigLoader;
pub use service::ServiceConfig;
