pub mod error;
pub mod http;
pub mod object;

use crate::asa::error::{ApiResult, Error};
use crate::asa::http::{DEFAULT_REQUEST_TIMEOUT, HttpClient, TlsPolicy};
use crate::asa::object::{
    CaCertificateImport, CaTrustpoint, CertificateDetails, CliCommands, DeviceClock,
    IdentityCertificateImport, IdentityTrustpoint, ItemList,
};
use itertools::Itertools;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use time::PrimitiveDateTime;
use tracing::{debug, info};
use url::Url;

/// Default port of the ASA REST management plane.
pub const DEFAULT_PORT: u16 = 443;
/// The device's built-in shared RSA key. Deleting an identity trustpoint must
/// never take this key with it.
pub const DEFAULT_KEY_PAIR: &str = "<Default-RSA-Key>";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The two trustpoint categories the ASA keeps separate listings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertKind {
    /// Leaf certificate plus private key, presented by the device itself.
    Identity,
    /// Trusted root or intermediate certificate, no key attached.
    Ca,
}

impl Display for CertKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CertKind::Identity => write!(f, "identity"),
            CertKind::Ca => write!(f, "ca"),
        }
    }
}

pub struct AsaClientBuilder {
    host: String,
    port: Option<u16>,
    username: String,
    password: String,
    tls: TlsPolicy,
    timeout: Duration,
}

impl AsaClientBuilder {
    /// `host` may carry an explicit `:port` suffix; the default management port
    /// is used otherwise.
    pub fn new(host: &str, username: &str, password: &str) -> AsaClientBuilder {
        let (host, port) = match host.rsplit_once(':') {
            Some((bare_host, port_str)) => match port_str.parse::<u16>() {
                Ok(port) => (bare_host.to_string(), Some(port)),
                Err(_) => (host.to_string(), None),
            },
            None => (host.to_string(), None),
        };
        Self {
            host,
            port,
            username: username.to_string(),
            password: password.to_string(),
            tls: TlsPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn tls_policy(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn try_build(self) -> ApiResult<AsaRestClient> {
        let port = self.port.unwrap_or(DEFAULT_PORT);
        let base = Url::parse(&format!("https://{}:{}", self.host, port))?;
        let http = HttpClient::try_new(&self.tls, self.timeout, &self.username, &self.password)?;
        Ok(AsaRestClient {
            http,
            base,
            host: self.host,
            port,
        })
    }
}

/// One ASA management endpoint. Every method is a single REST call, dispatched
/// sequentially by the caller; nothing is retried or cached, and all state
/// lives on the device.
pub struct AsaRestClient {
    http: HttpClient,
    base: Url,
    host: String,
    port: u16,
}

impl Display for AsaRestClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.host)
    }
}

impl AsaRestClient {
    #[cfg(test)]
    pub(crate) fn with_base_url(base: Url, username: &str, password: &str) -> ApiResult<Self> {
        let host = base.host_str().unwrap_or_default().to_string();
        let port = base.port_or_known_default().unwrap_or(DEFAULT_PORT);
        let http = HttpClient::try_new(&TlsPolicy::WebPki, DEFAULT_REQUEST_TIMEOUT, username, password)?;
        Ok(Self {
            http,
            base,
            host,
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn api_url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base.join(path)?)
    }

    async fn expect_success(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Error::get_error_from_http(response).await)
        }
    }

    async fn fetch_items<T: DeserializeOwned>(&self, path: &str) -> ApiResult<ItemList<T>> {
        let response = self.http.get(self.api_url(path)?).await?;
        let response = Self::expect_success(response).await?;
        Ok(response.json().await?)
    }

    /// Raw TCP reachability check of the management port.
    pub async fn probe_tcp(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(target)).await,
            Ok(Ok(_))
        )
    }

    /// Credential check: run a harmless `show version` through the CLI proxy
    /// and hand back whatever status the device answered with.
    pub async fn probe_auth(&self) -> ApiResult<StatusCode> {
        let body = CliCommands::single("show version");
        let response = self.http.post(self.api_url("/api/cli")?, &body).await?;
        Ok(response.status())
    }

    /// Union of identity `objectId`s and CA `trustpointName`s, without
    /// duplicates, identity listing first.
    pub async fn list_trustpoints(&self, kind: Option<CertKind>) -> ApiResult<Vec<String>> {
        let mut trustpoints = Vec::new();
        if matches!(kind, None | Some(CertKind::Identity)) {
            let listing: ItemList<IdentityTrustpoint> =
                self.fetch_items("/api/certificate/identity").await?;
            trustpoints.extend(listing.items.into_iter().filter_map(|item| item.object_id));
        }
        if matches!(kind, None | Some(CertKind::Ca)) {
            let listing: ItemList<CaTrustpoint> = self.fetch_items("/api/certificate/ca").await?;
            trustpoints.extend(
                listing
                    .items
                    .into_iter()
                    .filter_map(|item| item.trustpoint_name),
            );
        }
        Ok(trustpoints.into_iter().unique().collect())
    }

    pub async fn certificate_details(&self, trustpoint: &str) -> ApiResult<CertificateDetails> {
        let response = self
            .http
            .get(self.api_url(&format!("/api/certificate/details/{trustpoint}"))?)
            .await?;
        let response = Self::expect_success(response).await?;
        Ok(response.json().await?)
    }

    /// The device's own wall clock, from the monitoring endpoint. Expiry is
    /// always judged against this clock, not the caller's, so a skewed
    /// automation host cannot produce false positives.
    pub async fn device_time(&self) -> ApiResult<PrimitiveDateTime> {
        let response = self.http.get(self.api_url("/api/monitoring/clock")?).await?;
        let response = Self::expect_success(response).await?;
        let clock: DeviceClock = response.json().await?;
        clock
            .to_timestamp()
            .map_err(|_| Error::MalformedResponse("device clock in unknown format"))
    }

    /// Whether the certificate in `trustpoint` has expired, per the device's
    /// own clock. A details response without `validityEndDate`, or a details
    /// lookup the device rejects, counts as not expired: nothing is deleted on
    /// ambiguous data.
    pub async fn cert_expired(&self, trustpoint: &str) -> ApiResult<bool> {
        let details = match self.certificate_details(trustpoint).await {
            Ok(details) => details,
            Err(Error::Device(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        let Some(raw_end_date) = details.validity_end_date else {
            return Ok(false);
        };
        let expires = crate::time::parse_device_timestamp(&raw_end_date)
            .map_err(|_| Error::MalformedResponse("validityEndDate in unknown format"))?;
        let now = self.device_time().await?;
        Ok(now > expires)
    }

    pub async fn list_expired(&self, kind: Option<CertKind>) -> ApiResult<Vec<String>> {
        let mut expired = Vec::new();
        for trustpoint in self.list_trustpoints(kind).await? {
            if self.cert_expired(&trustpoint).await? {
                expired.push(trustpoint);
            }
        }
        Ok(expired)
    }

    /// Remove every expired trustpoint whose name matches `pattern`. The match
    /// must begin at the start of the name. Returns the number removed.
    pub async fn purge_expired(
        &self,
        kind: Option<CertKind>,
        pattern: &Regex,
    ) -> ApiResult<usize> {
        let expired = self.list_expired(kind).await?;
        let purge: Vec<String> = expired
            .into_iter()
            .filter(|name| pattern.find(name).is_some_and(|m| m.start() == 0))
            .collect();
        for trustpoint in &purge {
            info!("removing expired trustpoint {trustpoint}");
            self.remove_trustpoint(trustpoint).await?;
        }
        Ok(purge.len())
    }

    /// Key pair bound to an identity trustpoint. `None` when the trustpoint is
    /// not identity-typed, or carries no key reference the agent reports.
    pub async fn trustpoint_key_pair(&self, trustpoint: &str) -> ApiResult<Option<String>> {
        let identities = self.list_trustpoints(Some(CertKind::Identity)).await?;
        if !identities.iter().any(|name| name == trustpoint) {
            return Ok(None);
        }
        let response = self
            .http
            .get(self.api_url(&format!("/api/certificate/identity/{trustpoint}"))?)
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        match response.json::<IdentityTrustpoint>().await {
            Ok(detail) => Ok(detail.key_pair),
            Err(_) => Ok(None),
        }
    }

    /// Delete a trustpoint. Identity trustpoints take their key pair with them,
    /// unless the key pair is the device's shared default key. A name that is
    /// not an identity trustpoint is deleted through the CA endpoint, where a
    /// 404 for an absent name is a no-op.
    pub async fn remove_trustpoint(&self, trustpoint: &str) -> ApiResult<()> {
        let identities = self.list_trustpoints(Some(CertKind::Identity)).await?;
        if identities.iter().any(|name| name == trustpoint) {
            let key_pair = self.trustpoint_key_pair(trustpoint).await?;
            let response = self
                .http
                .delete(self.api_url(&format!("/api/certificate/identity/{trustpoint}"))?)
                .await?;
            Self::expect_success(response).await?;
            if let Some(key_pair) = key_pair {
                if key_pair != DEFAULT_KEY_PAIR {
                    self.remove_key_pair(&key_pair).await?;
                }
            }
        } else {
            let response = self
                .http
                .delete(self.api_url(&format!("/api/certificate/ca/{trustpoint}"))?)
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!("trustpoint {trustpoint} not present on device, nothing to remove");
                return Ok(());
            }
            Self::expect_success(response).await?;
        }
        Ok(())
    }

    pub async fn remove_key_pair(&self, key_pair: &str) -> ApiResult<()> {
        let response = self
            .http
            .delete(self.api_url(&format!("/api/certificate/keypair/{key_pair}"))?)
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Install a PEM-encoded CA certificate under the given trustpoint name.
    pub async fn import_ca_certificate(&self, trustpoint: &str, pem: &str) -> ApiResult<()> {
        let body = CaCertificateImport::new(trustpoint, pem);
        let response = self.http.post(self.api_url("/api/certificate/ca")?, &body).await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Install a PKCS#12 identity bundle (base64, already line-wrapped) under
    /// the given trustpoint name.
    pub async fn import_identity(
        &self,
        trustpoint: &str,
        p12_base64: &str,
        passphrase: &str,
    ) -> ApiResult<()> {
        let body = IdentityCertificateImport::new(trustpoint, p12_base64, passphrase);
        let response = self
            .http
            .post(self.api_url("/api/certificate/identity")?, &body)
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Bind a trustpoint's certificate to TLS connections for an SNI domain.
    /// Hands back the device's answer status; transport failures are errors.
    pub async fn activate_sni(&self, domain: &str, trustpoint: &str) -> ApiResult<StatusCode> {
        let command = format!("ssl trust-point {trustpoint} domain {domain}");
        let body = CliCommands::single(command);
        let response = self.http.post(self.api_url("/api/cli")?, &body).await?;
        Ok(response.status())
    }

    /// Persist the running configuration (`write memory`).
    pub async fn save_config(&self) -> ApiResult<()> {
        let response = self
            .http
            .post(self.api_url("/api/commands/writemem")?, &serde_json::json!({}))
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}
