use serde::Deserialize;

/// Server settings: defaults overridden by `FLOWBOARD_SERVER__*` environment
/// variables (e.g. `FLOWBOARD_SERVER__PORT=9000`). Secrets (gateway key,
/// database URL, auth keys) are read separately from plain env vars at
/// startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8787)?
            .add_source(
                config::Environment::with_prefix("FLOWBOARD_SERVER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
