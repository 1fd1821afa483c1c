use anyhow::{Context, Error};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::num_bigint::BigUint;
use x509_parser::pem::Pem;
use x509_parser::prelude::FromDer;

/// The maximum number of certificates we will parse in a PEM-array of certificates by default
const DEFAULT_MAX_CERTIFICATE_CHAIN_LENGTH: usize = 100;

/// Render a certificate serial as hex byte pairs, most significant byte first,
/// joined by `separator`, with no leading zero byte. A zero serial renders as
/// a single `00` byte. Uppercase callers can `to_ascii_uppercase` the result.
pub fn hex_serial(serial: &BigUint, separator: &str) -> String {
    serial
        .to_bytes_be()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(separator)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub serial: BigUint,
    pub subject: String,
    pub issuer: String,
    pub validity: Validity,
    pub dns_names: Vec<String>,
    /// basicConstraints CA flag. Absence of the extension counts as not a CA.
    pub is_ca: bool,
    raw_bytes: Vec<u8>,
}

impl TryFrom<Vec<u8>> for ParsedCertificate {
    type Error = Error;

    fn try_from(der_bytes: Vec<u8>) -> anyhow::Result<ParsedCertificate> {
        let (_extra_bytes, cert) = x509_parser::certificate::X509Certificate::from_der(&der_bytes)
            .context("Reading X.509 structure: Decoding DER failed")?;
        let serial = cert.serial.clone();
        let subject = cert.subject.to_string();
        let issuer = cert.issuer.to_string();
        let validity = (&cert.validity).into();
        let mut dns_names = Vec::new();
        let mut is_ca = false;
        for extension in cert.extensions() {
            match extension.parsed_extension() {
                ParsedExtension::BasicConstraints(basic_constraints) => {
                    is_ca = basic_constraints.ca;
                }
                ParsedExtension::SubjectAlternativeName(san) => {
                    for general_name in &san.general_names {
                        if let GeneralName::DNSName(dns_name) = general_name {
                            dns_names.push((*dns_name).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(Self {
            serial,
            subject,
            issuer,
            validity,
            dns_names,
            is_ca,
            raw_bytes: der_bytes,
        })
    }
}

impl ParsedCertificate {
    pub fn as_der_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.raw_bytes.clone()))
    }

    /// Self-signed, i.e. prunable as "the root" of a chain.
    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    pub fn serial_hex(&self, separator: &str) -> String {
        hex_serial(&self.serial, separator)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: time::OffsetDateTime,
    pub not_after: time::OffsetDateTime,
}

impl From<&x509_parser::certificate::Validity> for Validity {
    fn from(value: &x509_parser::certificate::Validity) -> Self {
        Self {
            not_before: value.not_before.to_datetime(),
            not_after: value.not_after.to_datetime(),
        }
    }
}

/// An ordered certificate chain loaded from one PEM file. Entries are only
/// ever removed, never reordered or appended.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    certificates: Vec<ParsedCertificate>,
}

impl CertificateBundle {
    pub fn load<P: AsRef<Path>>(cert_file: P) -> anyhow::Result<Self> {
        let cert_file = cert_file.as_ref();
        let cert_file_display = cert_file.display();
        let cert_file =
            File::open(cert_file).context(format!("Opening {cert_file_display} failed"))?;
        let reader = BufReader::new(cert_file);
        Self::from_reader(reader)
            .context(format!("Parsing certificate {cert_file_display} failed"))
    }

    pub fn from_pem_bytes<B: AsRef<[u8]>>(pem_bytes: B) -> anyhow::Result<Self> {
        let reader = Cursor::new(pem_bytes);
        Self::from_reader(reader)
    }

    fn from_reader<R: BufRead + Seek>(reader: R) -> anyhow::Result<Self> {
        let mut certificates = Vec::new();
        for pem in Pem::iter_from_reader(reader).take(DEFAULT_MAX_CERTIFICATE_CHAIN_LENGTH) {
            let pem = pem.context("Reading PEM block failed")?;
            let parsed = ParsedCertificate::try_from(pem.contents)?;
            certificates.push(parsed);
        }
        Ok(Self { certificates })
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn certificates(&self) -> &[ParsedCertificate] {
        &self.certificates
    }

    /// Remove the self-signed root, if one is present. Scans from the end of
    /// the chain and removes at most one certificate per call. Reports whether
    /// a certificate was removed.
    pub fn prune_root(&mut self) -> bool {
        for i in (0..self.certificates.len()).rev() {
            if self.certificates[i].is_self_signed() {
                self.certificates.remove(i);
                return true;
            }
        }
        false
    }

    /// Remove the first non-CA certificate found scanning from the END of the
    /// chain. Note that `server_certificate` scans in the opposite direction;
    /// the asymmetry is deliberate.
    pub fn prune_non_ca(&mut self) -> bool {
        for i in (0..self.certificates.len()).rev() {
            if !self.certificates[i].is_ca {
                self.certificates.remove(i);
                return true;
            }
        }
        false
    }

    /// The first non-CA certificate found scanning from the START of the chain.
    pub fn server_certificate(&self) -> Option<&ParsedCertificate> {
        self.certificates.iter().find(|cert| !cert.is_ca)
    }
}
