use std::{env, net::SocketAddr, path::PathBuf};

use crate::endpoints::DEFAULT_FALLBACK_ORIGIN;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_UI_CONFIG_PATH: &str = "/opt/roomctl/config/ui.yaml";
pub const DEFAULT_DEVICES_PATH: &str = "/opt/roomctl/config/devices.yaml";

#[derive(Clone, Debug)]
pub struct PanelConfig {
    pub listen_addr: SocketAddr,
    /// Tried before any other origin when set.
    pub backend_base: Option<String>,
    pub fallback_origin: String,
    pub ui_config_path: PathBuf,
    pub devices_path: PathBuf,
    pub operator_pin: Option<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            backend_base: None,
            fallback_origin: DEFAULT_FALLBACK_ORIGIN.to_string(),
            ui_config_path: PathBuf::from(DEFAULT_UI_CONFIG_PATH),
            devices_path: PathBuf::from(DEFAULT_DEVICES_PATH),
            operator_pin: None,
        }
    }
}

impl PanelConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let listen_addr = env::var("PANEL_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|err| format!("invalid PANEL_ADDR: {err}"))?;

        Ok(Self {
            listen_addr,
            backend_base: non_empty_var("ROOMCTL_BASE"),
            fallback_origin: non_empty_var("ROOMCTL_FALLBACK")
                .unwrap_or_else(|| DEFAULT_FALLBACK_ORIGIN.to_string()),
            ui_config_path: non_empty_var("ROOMCTL_UI_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UI_CONFIG_PATH)),
            devices_path: non_empty_var("ROOMCTL_DEVICES")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICES_PATH)),
            operator_pin: non_empty_var("ROOMCTL_OPERATOR_PIN"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
