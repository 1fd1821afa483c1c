use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt::{Display, Formatter};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Device(DeviceError),
    MalformedResponse(&'static str),
    InvalidEndpoint(url::ParseError),
    IoError(std::io::Error),
}

impl Error {
    /// Turn a non-2xx response into a structured device error, keeping the
    /// ASA's `messages` body when it sent one.
    pub async fn get_error_from_http(err_response: reqwest::Response) -> Error {
        let status = err_response.status();
        let problem = err_response.json::<DeviceProblem>().await.ok();
        Error::Device(DeviceError { status, problem })
    }

    /// HTTP 401/403 from the device, i.e. bad or insufficient credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Error::Device(device) => {
                device.status == StatusCode::UNAUTHORIZED || device.status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    /// Failure to reach the device at all (TCP/TLS connect or timeout).
    pub fn is_connect_failure(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Error {
        Error::Device(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::InvalidEndpoint(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self {
            Error::Http(e) => {
                write!(f, "HTTP error: {e}")
            }
            Error::Device(e) => {
                write!(f, "{e}")
            }
            Error::MalformedResponse(e) => write!(f, "unexpected device response: {e}"),
            Error::InvalidEndpoint(e) => write!(f, "invalid device endpoint: {e}"),
            Error::IoError(io) => {
                write!(f, "I/O error: {io}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // Skip one level (i.e. directly call source on the embedded error)
        // because we already print the higher-level error during Display, so don't duplicate it in the chain.
        match &self {
            Error::Http(e) => e.source(),
            Error::IoError(io) => io.source(),
            Error::InvalidEndpoint(e) => e.source(),
            Error::Device(_) | Error::MalformedResponse(_) => None,
        }
    }
}

/// A non-2xx answer from the REST agent, with the decoded error body if the
/// agent sent one.
#[derive(Debug)]
pub struct DeviceError {
    pub status: StatusCode,
    pub problem: Option<DeviceProblem>,
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let status = self.status;
        write!(f, "the device reported an error (HTTP {status})")?;
        if let Some(problem) = &self.problem {
            write!(f, ": {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DeviceError {}

/// Error body of the ASA REST agent: a list of `messages`, each with a severity
/// level, a machine-readable code and free-form details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct DeviceProblem {
    #[serde(default)]
    pub messages: Vec<DeviceMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct DeviceMessage {
    pub level: Option<String>,
    pub code: Option<String>,
    pub details: Option<String>,
}

impl Display for DeviceProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.messages.is_empty() {
            return write!(f, "no further details provided");
        }
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}

impl Display for DeviceMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{code}] ")?;
        }
        if let Some(details) = &self.details {
            write!(f, "{details}")?;
        } else if let Some(level) = &self.level {
            write!(f, "{level}")?;
        } else {
            write!(f, "unspecified error")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::single(
        r#"{
    "messages": [
        {
            "level": "Error",
            "code": "DUPLICATE",
            "details": "Trustpoint already exists"
        }
    ]
}"#, DeviceProblem {
        messages: vec![DeviceMessage {
            level: Some("Error".to_string()),
            code: Some("DUPLICATE".to_string()),
            details: Some("Trustpoint already exists".to_string()),
        }],
    })]
    #[case::empty(r"{}", DeviceProblem { messages: vec![] })]
    fn test_deserialize_problem(#[case] json: &str, #[case] expected: DeviceProblem) {
        let actual = serde_json::from_str(json).expect("Deserialization must not fail");
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_device_error_display_includes_details() {
        let error = DeviceError {
            status: StatusCode::BAD_REQUEST,
            problem: Some(DeviceProblem {
                messages: vec![DeviceMessage {
                    level: Some("Error".to_string()),
                    code: None,
                    details: Some("certificate import failed".to_string()),
                }],
            }),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("400"));
        assert!(rendered.contains("certificate import failed"));
    }
}
