use crate::config::{ConfigBackend, Configuration};
use anyhow::Error;
use std::path::Path;

/// Fresh installations start with an empty device inventory: unlike a public
/// CA list, there is nothing sensible to preconfigure for someone else's
/// firewall.
#[derive(Debug, Clone, Default)]
pub struct DefaultConfig {}

impl DefaultConfig {
    pub fn get_config(&self) -> Configuration {
        Configuration { devices: vec![] }
    }
}

impl ConfigBackend for DefaultConfig {
    fn load<P: AsRef<Path>>(_file: P) -> Result<Configuration, Error> {
        Ok(Self::default().get_config())
    }

    fn save<P: AsRef<Path>>(_config: &Configuration, _file: P) -> Result<(), Error> {
        unimplemented!("default backend cannot save to file")
    }
}
