use crate::asa::error::ApiResult;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{ClientBuilder, RequestBuilder, Response};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Uniform per-request timeout applied to every call unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the device's management certificate is verified.
///
/// Skipping verification is an explicit operator opt-in, configured per client
/// and logged at construction. It is never a silent default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Validate against the built-in webpki root store.
    #[default]
    WebPki,
    /// Validate against the CA certificates in the given PEM bundle file only.
    CaBundle(PathBuf),
    /// Do not validate the device certificate at all.
    Insecure,
}

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpClient {
    client: reqwest::Client,
    username: String,
    password: String,
}

impl HttpClient {
    pub fn try_new(
        tls: &TlsPolicy,
        timeout: Duration,
        username: &str,
        password: &str,
    ) -> ApiResult<Self> {
        let mut client_builder = ClientBuilder::new()
            // The ASA management plane is HTTPS-only, except for test runs against a local mock
            .https_only(!cfg!(test))
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            // Make TRACE logs available for test or debug builds (still needs to be enabled separately)
            .connection_verbose(cfg!(any(test, debug_assertions)));
        client_builder = match tls {
            TlsPolicy::WebPki => client_builder,
            TlsPolicy::CaBundle(bundle_file) => {
                let pem_bytes = std::fs::read(bundle_file)?;
                let mut builder = client_builder.tls_built_in_root_certs(false);
                for certificate in reqwest::Certificate::from_pem_bundle(&pem_bytes)? {
                    builder = builder.add_root_certificate(certificate);
                }
                builder
            }
            TlsPolicy::Insecure => {
                warn!("TLS certificate verification is disabled for this device");
                client_builder
                    .tls_built_in_root_certs(false)
                    .danger_accept_invalid_certs(true)
            }
        };
        Ok(Self {
            client: client_builder.build()?,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn execute(&self, request_builder: RequestBuilder) -> ApiResult<Response> {
        let response = request_builder
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(response)
    }

    pub async fn get(&self, url: Url) -> ApiResult<Response> {
        self.execute(self.client.get(url)).await
    }

    pub async fn delete(&self, url: Url) -> ApiResult<Response> {
        self.execute(self.client.delete(url)).await
    }

    pub async fn post<T: Serialize>(&self, url: Url, body: &T) -> ApiResult<Response> {
        let request_builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(body);
        self.execute(request_builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HttpClient {
        HttpClient::try_new(&TlsPolicy::WebPki, DEFAULT_REQUEST_TIMEOUT, "user", "pass").unwrap()
    }

    fn server_url(server: &mockito::Server, path: &str) -> Url {
        Url::parse(&server.url()).unwrap().join(path).unwrap()
    }

    #[test]
    fn test_try_new() {
        let _ = test_client();
    }

    #[test]
    fn test_try_new_with_missing_ca_bundle_fails() {
        let missing = PathBuf::from("/nonexistent/ca-bundle.pem");
        let result = HttpClient::try_new(
            &TlsPolicy::CaBundle(missing),
            DEFAULT_REQUEST_TIMEOUT,
            "user",
            "pass",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sends_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        // "user:pass" in base64
        let mock = server
            .mock("GET", "/api/certificate/identity")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .create_async()
            .await;

        let client = test_client();
        client
            .get(server_url(&server, "/api/certificate/identity"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .create_async()
            .await;

        let client = test_client();
        client.get(server_url(&server, "/")).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_sends_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cli")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let client = test_client();
        client
            .post(server_url(&server, "/api/cli"), &())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/certificate/keypair/test")
            .with_status(200)
            .create_async()
            .await;

        let client = test_client();
        let response = client
            .delete(server_url(&server, "/api/certificate/keypair/test"))
            .await
            .unwrap();
        assert!(response.status().is_success());
        mock.assert_async().await;
    }
}
