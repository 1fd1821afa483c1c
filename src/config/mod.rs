use crate::asa::DEFAULT_PORT;
use crate::asa::http::{DEFAULT_REQUEST_TIMEOUT, TlsPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod default;
mod toml;

use crate::config::default::DefaultConfig;
use crate::config::toml::TomlConfiguration;

pub const CONFIG_FILE: &str = "certasa.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default, rename = "device", skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceConfiguration>,
}

impl Configuration {
    pub fn find_device(&self, name: &str) -> Option<&DeviceConfiguration> {
        self.devices.iter().find(|device| device.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// CA bundle used to verify the device's management certificate, instead
    /// of the built-in root store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<PathBuf>,
    /// Explicit opt-out of TLS verification for this device
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_verify: bool,
    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl DeviceConfiguration {
    pub fn tls_policy(&self) -> TlsPolicy {
        if self.no_verify {
            TlsPolicy::Insecure
        } else if let Some(bundle) = &self.ca_bundle {
            TlsPolicy::CaBundle(bundle.clone())
        } else {
            TlsPolicy::WebPki
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !value
}

pub fn get_default_config_directory() -> PathBuf {
    PathBuf::from("/etc/certasa")
}

pub trait ConfigBackend {
    fn load<P: AsRef<Path>>(file: P) -> Result<Configuration, anyhow::Error>;
    fn save<P: AsRef<Path>>(config: &Configuration, file: P) -> Result<(), anyhow::Error>;
}

pub fn load<P: AsRef<Path>>(file: P) -> Result<Configuration, anyhow::Error> {
    if file.as_ref().exists() {
        TomlConfiguration::load(file)
    } else {
        let default = DefaultConfig::load(&file)?;
        TomlConfiguration::save(&default, &file)?;
        Ok(default)
    }
}

pub fn save<P: AsRef<Path>>(config: &Configuration, file: P) -> Result<(), anyhow::Error> {
    TomlConfiguration::save(config, file)
}
