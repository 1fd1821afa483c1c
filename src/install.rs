use crate::asa::error::Error as ApiError;
use crate::asa::{AsaRestClient, CertKind};
use crate::cert::CertificateBundle;
use crate::pkcs12::IdentityBundle;
use anyhow::anyhow;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

/// Prefix of every trustpoint name this installer manages. Cleanup only ever
/// touches names under this prefix.
pub const DEFAULT_NAME_PREFIX: &str = "ACME";

pub type InstallResult<T> = Result<T, InstallError>;

/// Failures of the install surface, classified for the automation framework:
/// it decides differently about an unreachable device than about rejected
/// credentials or a failed device command.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("cannot reach the device: {0}")]
    Connectivity(anyhow::Error),
    #[error("the device rejected our credentials: {0}")]
    Authentication(anyhow::Error),
    #[error("device command failed: {0}")]
    Device(anyhow::Error),
    #[error(transparent)]
    Client(anyhow::Error),
}

impl From<ApiError> for InstallError {
    fn from(err: ApiError) -> Self {
        if err.is_auth_failure() {
            InstallError::Authentication(err.into())
        } else if err.is_connect_failure() {
            InstallError::Connectivity(err.into())
        } else {
            InstallError::Device(err.into())
        }
    }
}

/// The surface an automation framework drives: probe the device before doing
/// anything, activate an SNI binding during challenge authorization, install
/// the issued certificate, and garbage-collect expired managed material.
#[async_trait]
pub trait CertificateInstaller {
    async fn prepare(&self) -> InstallResult<()>;
    async fn authorize(&self, domain: &str, trustpoint: &str) -> InstallResult<()>;
    async fn deploy(
        &self,
        chain_file: &Path,
        key_file: &Path,
        passphrase: &str,
    ) -> InstallResult<String>;
    async fn cleanup(&self, kind: Option<CertKind>) -> InstallResult<usize>;
}

pub struct AsaInstaller {
    client: AsaRestClient,
    name_prefix: String,
}

impl AsaInstaller {
    pub fn new(client: AsaRestClient) -> Self {
        Self::with_prefix(client, DEFAULT_NAME_PREFIX)
    }

    pub fn with_prefix(client: AsaRestClient, name_prefix: impl Into<String>) -> Self {
        Self {
            client,
            name_prefix: name_prefix.into(),
        }
    }

    pub fn client(&self) -> &AsaRestClient {
        &self.client
    }

    fn identity_name(&self, serial_hex: &str) -> String {
        format!("{}-{}", self.name_prefix, serial_hex)
    }

    fn ca_name(&self, serial_hex: &str) -> String {
        format!("{}-CA-{}", self.name_prefix, serial_hex)
    }
}

#[async_trait]
impl CertificateInstaller for AsaInstaller {
    async fn prepare(&self) -> InstallResult<()> {
        if !self.client.probe_tcp().await {
            return Err(InstallError::Connectivity(anyhow!(
                "TCP connect to {}:{} failed",
                self.client.host(),
                self.client.port()
            )));
        }
        let status = self.client.probe_auth().await?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(InstallError::Authentication(anyhow!(
                "{} answered HTTP {status} to a harmless command",
                self.client
            )));
        }
        if !status.is_success() {
            return Err(InstallError::Device(anyhow!(
                "{} answered HTTP {status} to a harmless command",
                self.client
            )));
        }
        Ok(())
    }

    async fn authorize(&self, domain: &str, trustpoint: &str) -> InstallResult<()> {
        let status = self.client.activate_sni(domain, trustpoint).await?;
        if !status.is_success() {
            return Err(InstallError::Device(anyhow!(
                "SNI activation of {trustpoint} for {domain} returned HTTP {status}"
            )));
        }
        info!("activated {trustpoint} for {domain}");
        Ok(())
    }

    async fn deploy(
        &self,
        chain_file: &Path,
        key_file: &Path,
        passphrase: &str,
    ) -> InstallResult<String> {
        let mut bundle = CertificateBundle::load(chain_file).map_err(InstallError::Client)?;
        if bundle.prune_root() {
            debug!("dropped the self-signed root from the chain");
        }
        let server = bundle.server_certificate().ok_or_else(|| {
            InstallError::Client(anyhow!(
                "{} contains no server certificate",
                chain_file.display()
            ))
        })?;
        let identity_name = self.identity_name(&server.serial_hex(""));
        let domains = server.dns_names.clone();

        for ca_cert in bundle.certificates().iter().filter(|cert| cert.is_ca) {
            let ca_name = self.ca_name(&ca_cert.serial_hex(""));
            info!("importing chain certificate as {ca_name}");
            self.client
                .import_ca_certificate(&ca_name, &ca_cert.to_pem())
                .await?;
        }

        let identity =
            IdentityBundle::from_pem_files(chain_file, key_file).map_err(InstallError::Client)?;
        let p12_base64 = identity.to_base64(passphrase).map_err(InstallError::Client)?;
        info!("importing identity bundle as {identity_name}");
        self.client
            .import_identity(&identity_name, &p12_base64, passphrase)
            .await?;

        for domain in &domains {
            self.authorize(domain, &identity_name).await?;
        }
        self.client.save_config().await?;
        Ok(identity_name)
    }

    async fn cleanup(&self, kind: Option<CertKind>) -> InstallResult<usize> {
        let pattern = Regex::new(&format!("^{}-", regex::escape(&self.name_prefix)))
            .map_err(|e| InstallError::Client(e.into()))?;
        let removed = self.client.purge_expired(kind, &pattern).await?;
        if removed > 0 {
            info!("purged {removed} expired managed trustpoints");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use url::Url;

    async fn test_installer(server: &ServerGuard) -> AsaInstaller {
        let base = Url::parse(&server.url()).unwrap();
        let client = AsaRestClient::with_base_url(base, "admin", "hunter2").unwrap();
        AsaInstaller::new(client)
    }

    #[test_log::test(tokio::test)]
    async fn test_prepare_succeeds_against_healthy_device() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/cli")
            .with_status(200)
            .create_async()
            .await;

        let installer = test_installer(&server).await;
        installer.prepare().await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_prepare_classifies_bad_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/cli")
            .with_status(401)
            .create_async()
            .await;

        let installer = test_installer(&server).await;
        let err = installer.prepare().await.unwrap_err();
        assert!(matches!(err, InstallError::Authentication(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_authorize_fails_hard_on_device_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/cli")
            .with_status(500)
            .create_async()
            .await;

        let installer = test_installer(&server).await;
        let err = installer
            .authorize("a.example.com", "ACME-0123")
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Device(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_deploy_installs_chain_and_binds_domains() {
        let mut server = Server::new_async().await;
        // Root is pruned, so exactly one CA import: the intermediate (serial 0x0abc)
        let import_ca = server
            .mock("POST", "/api/certificate/ca")
            .match_body(Matcher::PartialJson(json!({
                "kind": "object#CACertificate",
                "trustpointName": "ACME-CA-0abc"
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let import_identity = server
            .mock("POST", "/api/certificate/identity")
            .match_body(Matcher::PartialJson(json!({
                "kind": "object#IdentityCertificate",
                "certPass": "hunter2",
                "name": "ACME-0123"
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let bind_a = server
            .mock("POST", "/api/cli")
            .match_body(Matcher::Json(json!({
                "commands": ["ssl trust-point ACME-0123 domain a.example.com"]
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let bind_b = server
            .mock("POST", "/api/cli")
            .match_body(Matcher::Json(json!({
                "commands": ["ssl trust-point ACME-0123 domain b.example.com"]
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let writemem = server
            .mock("POST", "/api/commands/writemem")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let installer = test_installer(&server).await;
        let trustpoint = installer
            .deploy(
                Path::new("testdata/certs/chain.pem"),
                Path::new("testdata/certs/leaf.key"),
                "hunter2",
            )
            .await
            .unwrap();
        assert_eq!(trustpoint, "ACME-0123");
        import_ca.assert_async().await;
        import_identity.assert_async().await;
        bind_a.assert_async().await;
        bind_b.assert_async().await;
        writemem.assert_async().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_cleanup_only_touches_managed_names() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/certificate/identity")
            .with_status(200)
            .with_body(json!({"items": []}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/api/certificate/ca")
            .with_status(200)
            .with_body(
                json!({"items": [
                    {"trustpointName": "ACME-CA-dead"},
                    {"trustpointName": "legacy-1"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        for name in ["ACME-CA-dead", "legacy-1"] {
            server
                .mock("GET", format!("/api/certificate/details/{name}").as_str())
                .with_status(200)
                .with_body(json!({"validityEndDate": "12:00:00 UTC Jan 1 2020"}).to_string())
                .create_async()
                .await;
        }
        server
            .mock("GET", "/api/monitoring/clock")
            .with_status(200)
            .with_body(
                json!({"time": "12:17:00", "timeZone": "UTC", "date": "Aug 6 2026"}).to_string(),
            )
            .create_async()
            .await;
        let delete_managed = server
            .mock("DELETE", "/api/certificate/ca/ACME-CA-dead")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let delete_legacy = server
            .mock("DELETE", "/api/certificate/ca/legacy-1")
            .expect(0)
            .create_async()
            .await;

        let installer = test_installer(&server).await;
        let removed = installer.cleanup(None).await.unwrap();
        assert_eq!(removed, 1);
        delete_managed.assert_async().await;
        delete_legacy.assert_async().await;
    }
}
