// Configuration module entry point
// Loads the layered configuration and builds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::Config;

/// Default config file looked up when no path is given (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Layers, lowest priority first: built-in defaults, the file (optional),
    /// then `MICROWIKI__SECTION__KEY` environment variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("MICROWIKI").separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "microwiki")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("storage.dir", ".")?
            .build()?;

        settings.try_deserialize()
    }

    /// Load from the path given on the command line, or `config.toml`
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Defaults-only configuration rooted at a given storage directory
#[cfg(test)]
pub fn test_config(storage_dir: &std::path::Path) -> Config {
    let mut cfg = Config::load_from("this-config-file-does-not-exist")
        .expect("defaults should deserialize");
    cfg.storage.dir = storage_dir.to_path_buf();
    cfg.logging.access_log = false;
    cfg
}
