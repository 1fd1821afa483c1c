use anyhow::{Context, bail};
use certasa::asa::{AsaClientBuilder, AsaRestClient, CertKind, DEFAULT_PORT};
use certasa::asa::http::TlsPolicy;
use certasa::cli::{
    ActivateCommand, CleanupCommand, DeployCommand, DetailsCommand, DeviceSelection,
    ExpiredCommand, ImportCaCommand, ImportIdentityCommand, ListCommand, PurgeCommand,
    RemoveCommand,
};
use certasa::config::{self, CONFIG_FILE, DeviceConfiguration};
use certasa::install::{AsaInstaller, CertificateInstaller};
use certasa::pkcs12::IdentityBundle;
use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const ENV_FILTER_NAME: &str = "CERTASA_LOG";

#[derive(Debug, Parser)]
#[command(version, about, long_about = "")]
struct CommandLineArguments {
    /// Path to configuration directory
    #[arg(short, long, env = "CERTASA_CONFIG", default_value_os_t = config::get_default_config_directory())]
    config: PathBuf,
    #[clap(flatten)]
    device: DeviceSelection,
    #[command(subcommand)]
    command: Command,
    /// Shorthand option to enable debug logging (logging can be fine-tuned via `CERTASA_LOG` environment variable)
    #[clap(long, short, action)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe connectivity and credentials
    Test,
    /// List trustpoints on the device
    List(ListCommand),
    /// Show certificate details for a trustpoint
    Details(DetailsCommand),
    /// List trustpoints whose certificate has expired
    Expired(ExpiredCommand),
    /// Remove expired trustpoints matching a name pattern
    Purge(PurgeCommand),
    /// Install a CA certificate
    ImportCa(ImportCaCommand),
    /// Install an identity certificate bundle
    ImportIdentity(ImportIdentityCommand),
    /// Bind a trustpoint's certificate to an SNI domain
    Activate(ActivateCommand),
    /// Remove a trustpoint (identity trustpoints take their key pair along)
    Remove(RemoveCommand),
    /// Persist the device's running configuration
    Save,
    /// Install a full certificate chain and bind all its domains
    Deploy(DeployCommand),
    /// Remove expired managed trustpoints
    Cleanup(CleanupCommand),
}

fn resolve_device(
    config_directory: &Path,
    selection: &DeviceSelection,
) -> anyhow::Result<DeviceConfiguration> {
    if let Some(host_spec) = &selection.host {
        let username = selection
            .username
            .clone()
            .context("--username is required together with --host")?;
        let password = selection
            .password
            .clone()
            .context("--password is required together with --host")?;
        let (host, port) = match host_spec.rsplit_once(':') {
            Some((bare_host, port_str)) if port_str.parse::<u16>().is_ok() => {
                (bare_host.to_string(), port_str.parse().unwrap())
            }
            _ => (host_spec.clone(), DEFAULT_PORT),
        };
        return Ok(DeviceConfiguration {
            name: host.clone(),
            host,
            port,
            username,
            password,
            ca_bundle: selection.ca_bundle.clone(),
            no_verify: selection.no_verify,
            timeout_secs: None,
        });
    }
    let config_file = config_directory.join(CONFIG_FILE);
    let configuration = config::load(&config_file)
        .context(format!("Loading {} failed", config_file.display()))?;
    if let Some(name) = &selection.device {
        return configuration.find_device(name).cloned().context(format!(
            "No device named {name:?} in {}",
            config_file.display()
        ));
    }
    match configuration.devices.as_slice() {
        [] => bail!(
            "No devices configured in {} (or pass --host)",
            config_file.display()
        ),
        [device] => Ok(device.clone()),
        _ => bail!("Multiple devices configured, pick one with --device"),
    }
}

fn build_client(
    device: &DeviceConfiguration,
    selection: &DeviceSelection,
) -> anyhow::Result<AsaRestClient> {
    let tls = if selection.no_verify {
        TlsPolicy::Insecure
    } else if let Some(bundle) = &selection.ca_bundle {
        TlsPolicy::CaBundle(bundle.clone())
    } else {
        device.tls_policy()
    };
    let timeout = selection.timeout.unwrap_or_else(|| device.timeout());
    let client = AsaClientBuilder::new(&device.host, &device.username, &device.password)
        .port(device.port)
        .tls_policy(tls)
        .timeout(timeout)
        .try_build()
        .context(format!("Cannot build a client for {}", device.host))?;
    Ok(client)
}

async fn process_command(command: Command, client: AsaRestClient) -> anyhow::Result<()> {
    match command {
        Command::Test => {
            if !client.probe_tcp().await {
                bail!("{client} is unreachable on port {}", client.port());
            }
            let status = client.probe_auth().await?;
            if !status.is_success() {
                bail!("{client} answered HTTP {status}; check credentials");
            }
            println!("{client}: reachable, credentials accepted");
        }
        Command::List(list) => {
            for trustpoint in client.list_trustpoints(list.kind.map(CertKind::from)).await? {
                println!("{trustpoint}");
            }
        }
        Command::Details(details) => {
            let details = client.certificate_details(&details.trustpoint).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Command::Expired(expired) => {
            for trustpoint in client.list_expired(expired.kind.map(CertKind::from)).await? {
                println!("{trustpoint}");
            }
        }
        Command::Purge(purge) => {
            let pattern = Regex::new(&purge.pattern)
                .context(format!("Invalid pattern {:?}", purge.pattern))?;
            let removed = client
                .purge_expired(purge.kind.map(CertKind::from), &pattern)
                .await?;
            println!("Removed {removed} expired trustpoints");
        }
        Command::ImportCa(import) => {
            let pem = std::fs::read_to_string(&import.file)
                .context(format!("Opening {} failed", import.file.display()))?;
            client
                .import_ca_certificate(&import.trustpoint, &pem)
                .await?;
            println!("Imported CA certificate as {}", import.trustpoint);
        }
        Command::ImportIdentity(import) => {
            let bundle = IdentityBundle::from_pem_files(&import.cert, &import.key)?;
            let p12_base64 = bundle.to_base64(&import.passphrase)?;
            client
                .import_identity(&import.trustpoint, &p12_base64, &import.passphrase)
                .await?;
            println!("Imported identity bundle as {}", import.trustpoint);
        }
        Command::Activate(activate) => {
            let status = client
                .activate_sni(&activate.domain, &activate.trustpoint)
                .await?;
            if !status.is_success() {
                bail!(
                    "Binding {} to {} failed with HTTP {status}",
                    activate.trustpoint,
                    activate.domain
                );
            }
            println!("Bound {} to {}", activate.trustpoint, activate.domain);
        }
        Command::Remove(remove) => {
            client.remove_trustpoint(&remove.trustpoint).await?;
            println!("Removed {}", remove.trustpoint);
        }
        Command::Save => {
            client.save_config().await?;
            println!("Configuration saved");
        }
        Command::Deploy(deploy) => {
            let installer = AsaInstaller::with_prefix(client, deploy.prefix);
            let trustpoint = installer
                .deploy(&deploy.chain, &deploy.key, &deploy.passphrase)
                .await?;
            println!("Deployed {trustpoint}");
        }
        Command::Cleanup(cleanup) => {
            let installer = AsaInstaller::with_prefix(client, cleanup.prefix);
            let removed = installer.cleanup(cleanup.kind.map(CertKind::from)).await?;
            println!("Removed {removed} expired managed trustpoints");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineArguments::parse();
    let filter = EnvFilter::try_from_env(ENV_FILTER_NAME).unwrap_or_else(|_| {
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose {
                "certasa=debug,info"
            } else {
                "info"
            })
        })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let device = resolve_device(&cli.config, &cli.device)?;
    let client = build_client(&device, &cli.device)?;
    process_command(cli.command, client).await
}
