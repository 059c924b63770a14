//! # sigflow
//!
//! Run streaming analytics programs, consume their results, and shut them
//! down safely from any thread.
//!
//! ## Feature Flags
//! - **`config`** (default): TOML configuration loading (`sigflow-config`)
//! - **`observability`** (default): logging initialisation (`sigflow-observability`)
//! - **`file-logging`**: rolling log files in addition to console output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sigflow::prelude::*;
//! use sigflow::transport::memory::MemoryTransport;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = MemoryTransport::new();
//! let client = Client::connect(&transport, "my-token", "us1")?;
//!
//! let now = 1_760_000_000_000;
//! let computation = client.execute("data('cpu.utilization').publish()", now - 3_600_000, now, 60_000)?;
//! while let Some(message) = computation.next() {
//!     println!("{:?}", message);
//! }
//! computation.close()?;
//! client.close();
//! # Ok(())
//! # }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use sigflow_client as client;
pub use sigflow_client::transport;

#[cfg(feature = "config")]
pub use sigflow_config as config;

#[cfg(feature = "observability")]
pub use sigflow_observability as observability;

/// Load, validate and connect in one step
///
/// Reads the configuration file (see `sigflow_config::find_config_file`),
/// applies environment and CLI overrides, validates, and opens a client.
#[cfg(feature = "config")]
pub fn connect_from_config(
    transport: &dyn transport::StreamTransport,
    config_path: Option<&std::path::Path>,
    cli_args: Option<&std::collections::HashMap<String, String>>,
) -> Result<client::Client, SetupError> {
    let config = sigflow_config::load_config(config_path, cli_args)?;
    sigflow_config::validate_config(&config)?;
    tracing::debug!(connection = ?config.connection, "loaded configuration");
    Ok(client::Client::from_config(transport, &config)?)
}

/// Failure while building a client from configuration
#[cfg(feature = "config")]
#[derive(Debug)]
pub enum SetupError {
    Config(sigflow_config::ConfigError),
    Client(client::ClientError),
}

#[cfg(feature = "config")]
impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::Config(e) => write!(f, "configuration error: {}", e),
            SetupError::Client(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "config")]
impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Config(e) => Some(e),
            SetupError::Client(e) => Some(e),
        }
    }
}

#[cfg(feature = "config")]
impl From<sigflow_config::ConfigError> for SetupError {
    fn from(err: sigflow_config::ConfigError) -> Self {
        SetupError::Config(err)
    }
}

#[cfg(feature = "config")]
impl From<client::ClientError> for SetupError {
    fn from(err: client::ClientError) -> Self {
        SetupError::Client(err)
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use sigflow_client::{
        Client, ClientError, ClientOptions, CollectResult, Computation, ComputationState,
        DataPoint, Message, Payload, Value,
    };

    #[cfg(feature = "config")]
    pub use sigflow_config::{load_config, validate_config, SigflowConfig};

    #[cfg(feature = "observability")]
    pub use sigflow_observability::{
        init_logging, init_logging_from_config, parse_debug_flags, CrateDebugFlags,
    };
}
