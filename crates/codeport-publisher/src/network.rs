// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network seams for the publication worker.
//!
//! The worker talks to two services: the origin network's gateway, which
//! serves artifact payloads, and the target network's gateway, which accepts
//! publications. Both sit behind traits so tests can script failures without
//! a wire.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// Errors reading an artifact payload from the origin network.
#[derive(Debug, Error)]
pub enum OriginError {
    /// The origin no longer serves this artifact.
    #[error("artifact payload not found on origin: {0}")]
    NotFound(i64),

    /// Transport or gateway failure.
    #[error("origin network error: {0}")]
    Network(String),
}

/// Errors publishing an artifact to the target network.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The signing account cannot cover the publication fee.
    #[error("insufficient funds on signing account")]
    InsufficientFunds,

    /// The target network rejected the artifact during simulation.
    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    /// Transport or gateway failure.
    #[error("target network error: {0}")]
    Network(String),
}

/// Read side: artifact payloads from the origin network.
#[async_trait]
pub trait OriginReader: Send + Sync {
    /// Fetch the raw payload for one artifact.
    async fn fetch_artifact_payload(&self, artifact_id: i64) -> Result<Vec<u8>, OriginError>;
}

/// Write side: artifact publication to the target network.
#[async_trait]
pub trait TargetPublisher: Send + Sync {
    /// Publish one payload, returning the identifier assigned by the target
    /// network.
    async fn publish(
        &self,
        signer: &str,
        payload: &[u8],
        gas_price: &str,
    ) -> Result<i64, PublishError>;
}

/// Source of the publication signing identity.
pub trait SigningProvider: Send + Sync {
    /// The address publications are signed with.
    fn signing_address(&self) -> String;
}

/// Signing provider backed by a fixed address from configuration.
#[derive(Debug, Clone)]
pub struct StaticSigningProvider {
    address: String,
}

impl StaticSigningProvider {
    /// Create a provider for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl SigningProvider for StaticSigningProvider {
    fn signing_address(&self) -> String {
        self.address.clone()
    }
}

/// Origin gateway client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOriginReader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOriginReader {
    /// Create a reader against the given gateway base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OriginReader for HttpOriginReader {
    async fn fetch_artifact_payload(&self, artifact_id: i64) -> Result<Vec<u8>, OriginError> {
        let url = format!("{}/v1/artifacts/{}/data", self.base_url, artifact_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OriginError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OriginError::NotFound(artifact_id));
        }
        if !response.status().is_success() {
            return Err(OriginError::Network(format!(
                "origin returned status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OriginError::Network(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[derive(Deserialize)]
struct PublishResponse {
    artifact_id: i64,
}

#[derive(Deserialize)]
struct GatewayError {
    code: String,
    #[serde(default)]
    message: String,
}

/// Target gateway client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTargetPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTargetPublisher {
    /// Create a publisher against the given gateway base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TargetPublisher for HttpTargetPublisher {
    async fn publish(
        &self,
        signer: &str,
        payload: &[u8],
        gas_price: &str,
    ) -> Result<i64, PublishError> {
        let url = format!("{}/v1/artifacts", self.base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "signer": signer,
                "payload": encoded,
                "gas_price": gas_price,
            }))
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: PublishResponse = response
                .json()
                .await
                .map_err(|e| PublishError::Network(e.to_string()))?;
            return Ok(body.artifact_id);
        }

        // Gateway failures carry a machine-readable code in the body.
        match response.json::<GatewayError>().await {
            Ok(err) if err.code == "insufficient_funds" => Err(PublishError::InsufficientFunds),
            Ok(err) if err.code == "simulation_failed" => {
                Err(PublishError::SimulationFailed(err.message))
            }
            Ok(err) => Err(PublishError::Network(format!(
                "target returned {} ({}): {}",
                status, err.code, err.message
            ))),
            Err(_) => Err(PublishError::Network(format!(
                "target returned status {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_artifact_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/artifacts/19/data"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"wasm-blob".to_vec()))
            .mount(&server)
            .await;

        let reader = HttpOriginReader::new(server.uri());
        let payload = reader.fetch_artifact_payload(19).await.unwrap();
        assert_eq!(payload, b"wasm-blob");
    }

    #[tokio::test]
    async fn test_fetch_missing_artifact_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/artifacts/7/data"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let reader = HttpOriginReader::new(server.uri());
        let err = reader.fetch_artifact_payload(7).await.unwrap_err();
        assert!(matches!(err, OriginError::NotFound(7)));
    }

    #[tokio::test]
    async fn test_publish_returns_target_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/artifacts"))
            .and(body_partial_json(serde_json::json!({
                "signer": "smo1signer",
                "gas_price": "0.025usmo",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "artifact_id": 4242 })),
            )
            .mount(&server)
            .await;

        let publisher = HttpTargetPublisher::new(server.uri());
        let id = publisher
            .publish("smo1signer", b"wasm-blob", "0.025usmo")
            .await
            .unwrap();
        assert_eq!(id, 4242);
    }

    #[tokio::test]
    async fn test_publish_maps_gateway_error_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/artifacts"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "insufficient_funds",
                "message": "fee exceeds balance",
            })))
            .mount(&server)
            .await;

        let publisher = HttpTargetPublisher::new(server.uri());
        let err = publisher
            .publish("smo1signer", b"wasm-blob", "0.025usmo")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_publish_maps_simulation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/artifacts"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "code": "simulation_failed",
                "message": "invalid wasm section",
            })))
            .mount(&server)
            .await;

        let publisher = HttpTargetPublisher::new(server.uri());
        let err = publisher
            .publish("smo1signer", b"wasm-blob", "0.025usmo")
            .await
            .unwrap_err();
        match err {
            PublishError::SimulationFailed(message) => {
                assert_eq!(message, "invalid wasm section");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
