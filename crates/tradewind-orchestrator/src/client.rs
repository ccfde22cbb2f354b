//! Control client for the remote trading orchestrator.
//!
//! Issues the safety-critical session commands (engage, wind-down,
//! emergency halt, risk throttle) against the orchestrator's REST surface
//! and reconciles the confirmed state into the session store. State is
//! confirmed-only: nothing is applied locally until the server's response
//! arrives, and responses are applied through the store's stale-write
//! guard so out-of-order delivery can never roll the mirror backwards.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use tradewind_abstraction::{ClientError, OrchestratorState};
use tradewind_core::config::OrchestratorEndpointConfig;
use tradewind_core::session::{DiagnosticKind, SessionStore};

/// Default request timeout; expiry surfaces as a transport error rather
/// than hanging a safety-critical command indefinitely.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Orchestrator control client.
#[derive(Debug, Clone)]
pub struct ControlClient {
    /// Base URL of the orchestrator REST API.
    base_url: String,
    /// Optional API key for authenticated deployments.
    api_key: Option<String>,
    /// HTTP client with the command timeout applied.
    client: Client,
    /// Store holding the confirmed state mirror; enforces the stale guard.
    store: Arc<SessionStore>,
}

impl ControlClient {
    /// Creates a control client with the default timeout and no auth.
    #[must_use]
    pub fn new(base_url: String, store: Arc<SessionStore>) -> Self {
        Self::with_timeout(base_url, None, DEFAULT_TIMEOUT, store)
    }

    /// Creates a control client with an explicit API key.
    #[must_use]
    pub fn with_api_key(base_url: String, api_key: String, store: Arc<SessionStore>) -> Self {
        Self::with_timeout(base_url, Some(api_key), DEFAULT_TIMEOUT, store)
    }

    /// Creates a control client from configuration.
    #[must_use]
    pub fn from_config(config: &OrchestratorEndpointConfig, store: Arc<SessionStore>) -> Self {
        Self::with_timeout(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
            store,
        )
    }

    /// Creates a control client with an explicit request timeout.
    #[must_use]
    pub fn with_timeout(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            base_url,
            api_key,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            store,
        }
    }

    /// Engages the orchestrator (go live).
    ///
    /// # Errors
    /// Returns `Transport` on network/status failure, `Decode` on an
    /// undecodable 2xx body. The held state is untouched on any error.
    pub async fn engage(&self) -> Result<OrchestratorState, ClientError> {
        self.post_command("engage", &EngageCommand {}).await
    }

    /// Starts an orderly wind-down over the given duration.
    ///
    /// # Errors
    /// Same contract as [`ControlClient::engage`].
    pub async fn wind_down(&self, duration_seconds: u64) -> Result<OrchestratorState, ClientError> {
        self.post_command(
            "wind-down",
            &WindDownCommand { command: "wind_down", duration_seconds },
        )
        .await
    }

    /// Trips the emergency halt breaker.
    ///
    /// # Errors
    /// Returns `InvalidCommand` without touching the network if `reason`
    /// is empty; otherwise the [`ControlClient::engage`] contract.
    pub async fn emergency_halt(&self, reason: &str) -> Result<OrchestratorState, ClientError> {
        if reason.trim().is_empty() {
            return Err(ClientError::InvalidCommand(
                "emergency halt requires a non-empty reason".to_string(),
            ));
        }
        self.post_command(
            "emergency-halt",
            &EmergencyHaltCommand { command: "emergency_halt", reason: reason.to_string() },
        )
        .await
    }

    /// Sets the risk throttle.
    ///
    /// # Errors
    /// Returns `InvalidCommand` without touching the network if `value`
    /// is outside [0, 1] or not finite; otherwise the
    /// [`ControlClient::engage`] contract.
    pub async fn set_risk_throttle(&self, value: f64) -> Result<OrchestratorState, ClientError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ClientError::InvalidCommand(format!(
                "risk throttle must be within [0, 1], got {}",
                value
            )));
        }
        self.post_command(
            "risk-throttle",
            &RiskThrottleCommand { command: "set_risk_throttle", value },
        )
        .await
    }

    /// Fetches the current orchestrator state.
    ///
    /// The read path goes through the same stale guard as the commands, so
    /// a poll racing a command can never roll the mirror backwards.
    ///
    /// # Errors
    /// Same contract as [`ControlClient::engage`].
    pub async fn get_state(&self) -> Result<OrchestratorState, ClientError> {
        let url = format!("{}/state", self.base_url);
        debug!(url = %url, "Fetching orchestrator state");

        let mut request = self.client.get(&url);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|e| self.transport_error(&url, &e))?;

        self.reconcile(&url, response).await
    }

    async fn post_command<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<OrchestratorState, ClientError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Dispatching orchestrator command");

        let mut request = self.client.post(&url).json(body);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|e| self.transport_error(&url, &e))?;

        self.reconcile(&url, response).await
    }

    /// Checks the status, decodes the envelope, and applies the state
    /// through the store's stale-write guard.
    async fn reconcile(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<OrchestratorState, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                url = %url,
                "Orchestrator returned error status"
            );
            let err = ClientError::Transport(format!("API error ({}): {}", status, error_text));
            self.store.record_diagnostic(DiagnosticKind::TransportFailure, err.to_string());
            return Err(err);
        }

        let envelope: Envelope<OrchestratorState> = response.json().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to parse orchestrator response");
            let err = ClientError::Decode(format!("Failed to parse response: {}", e));
            self.store.record_diagnostic(DiagnosticKind::DecodeFailure, err.to_string());
            err
        })?;

        Ok(self.store.apply_orchestrator_state(envelope.data))
    }

    fn transport_error(&self, url: &str, e: &reqwest::Error) -> ClientError {
        error!(error = %e, url = %url, "Failed to reach orchestrator");
        let err = if e.is_timeout() {
            ClientError::Transport(format!("Request timed out: {}", e))
        } else {
            ClientError::Transport(format!("Network error: {}", e))
        };
        self.store.record_diagnostic(DiagnosticKind::TransportFailure, err.to_string());
        err
    }
}

// Orchestrator wire structures. Responses arrive wrapped in an envelope
// whose extra metadata fields are ignored.

#[derive(Debug, Serialize)]
struct EngageCommand {}

#[derive(Debug, Serialize)]
struct WindDownCommand {
    command: &'static str,
    duration_seconds: u64,
}

#[derive(Debug, Serialize)]
struct EmergencyHaltCommand {
    command: &'static str,
    reason: String,
}

#[derive(Debug, Serialize)]
struct RiskThrottleCommand {
    command: &'static str,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}
