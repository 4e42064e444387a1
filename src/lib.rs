//! Gateway client - main library
//!
//! ## Architecture
//!
//! - **bin_common**: shared utilities for binaries (config path, YAML config, logging)
//! - **cordgate**: gateway sessions and the shard coordinator (re-exported from workspace)
//! - **cordrest**: REST rate limiter and client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,no_run
//! use cord_client::bin_common::{load_config_from_env, ClientConfig, ConfigType};
//!
//! let config = ClientConfig::load(load_config_from_env(ConfigType::Gateway)).unwrap();
//! ```

// Re-export workspace libraries for convenience
pub use cordgate;
pub use cordrest;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod config;
    pub mod logging;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use config::{ClientConfig, ConfigError, GatewaySettings, RestSettings};
    pub use logging::init_tracing;
}
