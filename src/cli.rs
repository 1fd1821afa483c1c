use crate::asa::CertKind;
use crate::time::parse_duration;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Trustpoint category filter as spelled on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CommandLineCertKind {
    /// Identity (leaf) trustpoints
    Identity,
    /// CA trustpoints
    Ca,
}

impl From<CommandLineCertKind> for CertKind {
    fn from(kind: CommandLineCertKind) -> Self {
        match kind {
            CommandLineCertKind::Identity => CertKind::Identity,
            CommandLineCertKind::Ca => CertKind::Ca,
        }
    }
}

/// Which device to talk to: a named entry from the configuration file, or an
/// ad hoc host given entirely on the command line.
#[derive(Debug, Args, Default)]
pub struct DeviceSelection {
    /// Name of a device from the configuration file
    #[clap(short, long, conflicts_with = "host")]
    pub device: Option<String>,
    /// Device hostname (optionally host:port), bypassing the configuration file
    #[clap(long)]
    pub host: Option<String>,
    /// Username for an ad hoc device
    #[clap(long, requires = "host")]
    pub username: Option<String>,
    /// Password for an ad hoc device
    #[clap(long, requires = "host", env = "CERTASA_PASSWORD")]
    pub password: Option<String>,
    /// CA bundle file used to verify the device's management certificate
    #[clap(long)]
    pub ca_bundle: Option<PathBuf>,
    /// Skip TLS verification of the device's management certificate
    #[clap(long, action)]
    pub no_verify: bool,
    /// Per-request timeout (e.g. "30s", "2m")
    #[clap(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list this trustpoint category
    #[clap(short, long)]
    pub kind: Option<CommandLineCertKind>,
}

#[derive(Debug, Args)]
pub struct DetailsCommand {
    /// Trustpoint to query
    pub trustpoint: String,
}

#[derive(Debug, Args)]
pub struct ExpiredCommand {
    /// Only check this trustpoint category
    #[clap(short, long)]
    pub kind: Option<CommandLineCertKind>,
}

#[derive(Debug, Args)]
pub struct PurgeCommand {
    /// Only purge this trustpoint category
    #[clap(short, long)]
    pub kind: Option<CommandLineCertKind>,
    /// Only purge trustpoints whose name matches this pattern (anchored at the
    /// start of the name)
    #[clap(short, long, default_value = "^.*$")]
    pub pattern: String,
}

#[derive(Debug, Args)]
pub struct ImportCaCommand {
    /// Trustpoint name to install the certificate under
    pub trustpoint: String,
    /// PEM file holding a single CA certificate
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ImportIdentityCommand {
    /// Trustpoint name to install the bundle under
    pub trustpoint: String,
    /// PEM file holding the certificate (a full chain's leaf is used)
    pub cert: PathBuf,
    /// PEM file holding the private key
    pub key: PathBuf,
    /// Passphrase protecting the PKCS#12 bundle in transit
    #[clap(long, env = "CERTASA_P12_PASS")]
    pub passphrase: String,
}

#[derive(Debug, Args)]
pub struct ActivateCommand {
    /// SNI domain to bind
    pub domain: String,
    /// Trustpoint whose certificate is presented for the domain
    pub trustpoint: String,
}

#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Trustpoint to remove
    pub trustpoint: String,
}

#[derive(Debug, Args)]
pub struct DeployCommand {
    /// PEM file holding the full certificate chain, leaf first
    pub chain: PathBuf,
    /// PEM file holding the leaf's private key
    pub key: PathBuf,
    /// Passphrase protecting the PKCS#12 bundle in transit
    #[clap(long, env = "CERTASA_P12_PASS")]
    pub passphrase: String,
    /// Prefix for the managed trustpoint names created on the device
    #[clap(long, default_value = crate::install::DEFAULT_NAME_PREFIX)]
    pub prefix: String,
}

#[derive(Debug, Args)]
pub struct CleanupCommand {
    /// Only clean up this trustpoint category
    #[clap(short, long)]
    pub kind: Option<CommandLineCertKind>,
    /// Prefix of the managed trustpoint names to clean up
    #[clap(long, default_value = crate::install::DEFAULT_NAME_PREFIX)]
    pub prefix: String,
}
