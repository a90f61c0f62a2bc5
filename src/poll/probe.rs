use std::path::PathBuf;
use std::time::Duration;

/// Availability check against a remote HTTP endpoint.
///
/// Shaped as a retriever for [`poll_until`](crate::poll::poll_until): test
/// code waits for a service to come up with
/// `poll_until_true(|| probe.is_up(), &options)`.
pub struct HttpProbe {
    agent: ureq::Agent,
    url: String,
}

impl HttpProbe {
    /// Probe the given URL with a per-request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        let config = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(request_timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True if the endpoint answered with a success status. Connection
    /// failures and non-2xx statuses both read as "not up yet".
    pub fn is_up(&self) -> bool {
        match self.agent.get(&self.url).call() {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Fetch the endpoint's body, for polls whose condition inspects the
    /// response text (e.g. waiting for a status field to change).
    ///
    /// # Errors
    ///
    /// Returns a message describing the transport or read failure.
    pub fn fetch_body(&self) -> Result<String, String> {
        let mut response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| format!("request to {} failed: {e}", self.url))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| format!("failed to read response body from {}: {e}", self.url))
    }
}

/// Message check against a service log file.
///
/// Integration tests wait for a daemon to log a specific line before
/// proceeding; this wraps the "has the line shown up yet" read.
pub struct LogWatch {
    path: PathBuf,
}

impl LogWatch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// True if the message appears anywhere in the log. A missing file
    /// reads as "not yet" rather than an error, since services create
    /// their logs lazily.
    pub fn contains(&self, message: &str) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents.contains(message),
            Err(_) => false,
        }
    }

    /// Number of lines the message appears in.
    ///
    /// # Errors
    ///
    /// Returns a message naming the log file if it cannot be read.
    pub fn occurrences(&self, message: &str) -> Result<usize, String> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("failed to read log {}: {e}", self.path.display()))?;
        Ok(contents.lines().filter(|line| line.contains(message)).count())
    }
}
