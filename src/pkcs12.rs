use anyhow::Context;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::path::Path;

/// The ASA import endpoint takes line-wrapped base64; stick to the customary width.
const BASE64_LINE_WIDTH: usize = 64;

/// A leaf certificate paired with its private key, exportable as a PKCS#12
/// bundle for the identity import endpoint.
pub struct IdentityBundle {
    certificate: X509,
    private_key: PKey<Private>,
}

impl IdentityBundle {
    /// Load the pair from PEM files. `cert_file` may be a full chain; only its
    /// first certificate (the leaf) goes into the bundle, since the chain's CA
    /// certificates are imported separately as CA trustpoints.
    pub fn from_pem_files<P: AsRef<Path>, Q: AsRef<Path>>(
        cert_file: P,
        key_file: Q,
    ) -> anyhow::Result<Self> {
        let cert_file = cert_file.as_ref();
        let cert_pem = std::fs::read(cert_file)
            .context(format!("Opening {} failed", cert_file.display()))?;
        let certificate = X509::from_pem(&cert_pem)
            .context(format!("Parsing certificate {} failed", cert_file.display()))?;
        let key_file = key_file.as_ref();
        let key_pem =
            std::fs::read(key_file).context(format!("Opening {} failed", key_file.display()))?;
        let private_key = PKey::private_key_from_pem(&key_pem)
            .context(format!("Parsing private key {} failed", key_file.display()))?;
        Ok(Self {
            certificate,
            private_key,
        })
    }

    pub fn to_der(&self, passphrase: &str) -> anyhow::Result<Vec<u8>> {
        let pkcs12 = Pkcs12::builder()
            .pkey(&self.private_key)
            .cert(&self.certificate)
            .build2(passphrase)
            .context("Building PKCS#12 bundle failed")?;
        pkcs12.to_der().context("Encoding PKCS#12 bundle failed")
    }

    /// DER under the given passphrase, base64-encoded and line-wrapped the way
    /// the ASA import payload wants it.
    pub fn to_base64(&self, passphrase: &str) -> anyhow::Result<String> {
        let der = self.to_der(passphrase)?;
        let encoded = BASE64_STANDARD.encode(der);
        let wrapped = encoded
            .as_bytes()
            .chunks(BASE64_LINE_WIDTH)
            .map(|line| std::str::from_utf8(line).expect("base64 output is ASCII"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(wrapped)
    }
}
