use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub control: ControlConfig,
    pub monitoring: MonitoringConfig,
    pub proxy: ProxySection,
    pub listener: ListenerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Control-plane base URL, e.g. https://central.example.com
    pub base_url: String,
    /// Shared bearer token; also required on the local push listener.
    pub token: String,
    pub server_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub heartbeat_interval_secs: u64,
    /// Interface to sample; autodetected from the default route when unset.
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(default = "default_ping_target")]
    pub ping_target: String,
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    #[serde(default = "default_ping_deadline_secs")]
    pub ping_deadline_secs: u32,
}

fn default_ping_target() -> String {
    "1.1.1.1".to_string()
}

fn default_ping_count() -> u32 {
    8
}

fn default_ping_deadline_secs() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxySection {
    pub config_path: String,
    #[serde(default = "default_proxy_service")]
    pub service: String,
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

fn default_proxy_service() -> String {
    "xray".to_string()
}

fn default_proxy_protocol() -> String {
    "vless".to_string()
}

fn default_proxy_port() -> u16 {
    443
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl AgentConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AgentConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.control.base_url.trim().is_empty(),
            "control.base_url must be non-empty"
        );
        anyhow::ensure!(
            !self.control.token.trim().is_empty(),
            "control.token must be non-empty"
        );
        anyhow::ensure!(
            !self.control.server_id.trim().is_empty(),
            "control.server_id must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.heartbeat_interval_secs > 0,
            "monitoring.heartbeat_interval_secs must be > 0, got {}",
            self.monitoring.heartbeat_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.ping_count > 0,
            "monitoring.ping_count must be > 0, got {}",
            self.monitoring.ping_count
        );
        anyhow::ensure!(
            self.monitoring.ping_deadline_secs > 0,
            "monitoring.ping_deadline_secs must be > 0, got {}",
            self.monitoring.ping_deadline_secs
        );
        anyhow::ensure!(
            !self.proxy.config_path.is_empty(),
            "proxy.config_path must be non-empty"
        );
        anyhow::ensure!(
            !self.proxy.protocol.is_empty(),
            "proxy.protocol must be non-empty"
        );
        anyhow::ensure!(
            self.listener.port > 0,
            "listener.port must be between 1 and 65535, got {}",
            self.listener.port
        );
        Ok(())
    }

    /// Control-plane base URL with any trailing slash removed.
    pub fn control_base_url(&self) -> String {
        self.control.base_url.trim_end_matches('/').to_string()
    }
}
