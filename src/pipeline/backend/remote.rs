//! HTTP compile service backend.

use super::{BackendError, BackendInitError, CompileBackend};
use crate::config::BackendKind;
use crate::pipeline::CompileJob;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::fs;
use std::time::Duration;

/// Longest slice of an error body kept in a failure message.
const MAX_ERROR_BODY: usize = 200;

/// Posts each source file to a compile service and stores the response body.
///
/// The request carries `compile=1`, `debug=0` and `obfuscate=<level>` as
/// query parameters; the body is the raw source. One attempt per call.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl RemoteBackend {
    /// Create a backend for `endpoint` with a per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, BackendInitError> {
        let init_err = |message: String| BackendInitError { kind: BackendKind::Remote, message };

        let endpoint =
            Url::parse(endpoint).map_err(|e| init_err(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("luac-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| init_err(e.to_string()))?;

        Ok(Self { client, endpoint, timeout })
    }

    /// Full request URL for a job.
    pub fn request_url(&self, job: &CompileJob) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("compile", "1")
            .append_pair("debug", "0")
            .append_pair("obfuscate", job.level.query_value());
        url
    }

    fn map_reqwest(&self, job: &CompileJob, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                file: job.source.clone(),
                kind: BackendKind::Remote,
                after: self.timeout,
            }
        } else {
            BackendError::Remote { file: job.source.clone(), cause: err.to_string() }
        }
    }
}

/// Shorten a response body for an error message.
fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl CompileBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn compile(&self, job: &CompileJob) -> Result<(), BackendError> {
        let source = fs::read(&job.source)
            .map_err(|e| BackendError::Io { file: job.source.clone(), source: e })?;

        let url = self.request_url(job);
        tracing::debug!(file = %job.source.display(), url = %url, "posting source");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(source)
            .send()
            .map_err(|e| self.map_reqwest(job, e))?;

        let status = response.status();
        let body = response.bytes().map_err(|e| self.map_reqwest(job, e))?;

        if !status.is_success() {
            return Err(BackendError::Remote {
                file: job.source.clone(),
                cause: format!("HTTP {}: {}", status, excerpt(&body)),
            });
        }

        // The service answers compile errors with a 200 and an ERROR line
        if body.starts_with(b"ERROR") {
            return Err(BackendError::Remote {
                file: job.source.clone(),
                cause: excerpt(&body),
            });
        }

        fs::write(&job.artifact, &body)
            .map_err(|e| BackendError::Io { file: job.source.clone(), source: e })
    }
}
