use crate::time::parse_device_timestamp;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// Generic `{"items": [...]}` wrapper used by the ASA listing endpoints.
#[derive(Debug, Deserialize)]
#[cfg_attr(test, derive(Serialize))]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// One entry of `/api/certificate/identity`. The same shape is returned by the
/// per-trustpoint GET, which additionally carries the bound key pair.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Serialize))]
pub struct IdentityTrustpoint {
    pub object_id: Option<String>,
    pub key_pair: Option<String>,
}

/// One entry of `/api/certificate/ca`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Serialize))]
pub struct CaTrustpoint {
    pub trustpoint_name: Option<String>,
}

/// Response of `/api/certificate/details/<trustpoint>`.
///
/// Every field is optional: the agent omits fields freely depending on the
/// certificate type, and expiry checks must degrade gracefully rather than
/// fail on a missing `validityEndDate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_trustpoints: Vec<String>,
}

/// Response of `/api/monitoring/clock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClock {
    pub time: String,
    pub time_zone: String,
    pub date: String,
}

impl DeviceClock {
    /// Reassemble the three clock fields into the device timestamp format and
    /// parse them. The result is device-local wall time.
    pub fn to_timestamp(&self) -> Result<PrimitiveDateTime, String> {
        let raw = format!("{} {} {}", self.time, self.time_zone, self.date);
        parse_device_timestamp(&raw)
    }
}

/// POST body of `/api/certificate/ca`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaCertificateImport {
    pub kind: &'static str,
    pub cert_text: Vec<String>,
    pub trustpoint_name: String,
}

impl CaCertificateImport {
    pub fn new(trustpoint: &str, pem: &str) -> Self {
        Self {
            kind: "object#CACertificate",
            cert_text: pem.lines().map(str::to_string).collect(),
            trustpoint_name: trustpoint.to_string(),
        }
    }
}

/// POST body of `/api/certificate/identity`. The agent wants the base64 PKCS#12
/// wrapped in literal `-----BEGIN/END PKCS12-----` marker lines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCertificateImport {
    pub kind: &'static str,
    pub cert_pass: String,
    pub cert_text: Vec<String>,
    pub name: String,
}

impl IdentityCertificateImport {
    pub fn new(trustpoint: &str, p12_base64: &str, passphrase: &str) -> Self {
        let mut cert_text = vec!["-----BEGIN PKCS12-----".to_string()];
        cert_text.extend(p12_base64.lines().map(str::to_string));
        cert_text.push("-----END PKCS12-----".to_string());
        Self {
            kind: "object#IdentityCertificate",
            cert_pass: passphrase.to_string(),
            cert_text,
            name: trustpoint.to_string(),
        }
    }
}

/// POST body of `/api/cli`: a batch of CLI commands proxied to the device.
#[derive(Debug, Serialize)]
pub struct CliCommands {
    pub commands: Vec<String>,
}

impl CliCommands {
    pub fn single(command: impl Into<String>) -> Self {
        Self {
            commands: vec![command.into()],
        }
    }
}
