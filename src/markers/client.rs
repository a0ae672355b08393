use async_trait::async_trait;
use geojson::Feature;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::error::MarkerError;
use super::service::{MarkerId, MarkerService, Token};
use crate::config::{Credentials, MarkersConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for the mission marker server.
pub struct PlaneteClient {
    http: Client,
    base_url: String,
    mission_id: String,
    credentials: Credentials,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct AddResponse {
    id: serde_json::Value,
}

impl PlaneteClient {
    pub fn new(config: &MarkersConfig, credentials: Credentials) -> Result<Self, MarkerError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mission_id: config.mission_id.clone(),
            credentials,
        })
    }

    fn mission_url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.mission_id, path)
    }

    fn marker_url(&self, id: &MarkerId) -> String {
        self.mission_url(&format!("geomarkers/{}", id))
    }
}

async fn check(operation: &'static str, response: Response) -> Result<Response, MarkerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MarkerError::Status {
        operation,
        status,
        body,
    })
}

/// A marker that is already gone counts as deleted.
fn delete_succeeded(status: StatusCode) -> bool {
    status.is_success() || matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
}

fn parse_id(value: serde_json::Value) -> Result<MarkerId, MarkerError> {
    match value {
        serde_json::Value::String(s) => Ok(MarkerId(s)),
        serde_json::Value::Number(n) => Ok(MarkerId(n.to_string())),
        other => Err(MarkerError::InvalidResponse(format!(
            "unexpected marker id {}",
            other
        ))),
    }
}

#[async_trait]
impl MarkerService for PlaneteClient {
    async fn get_token(&self) -> Result<Token, MarkerError> {
        let response = self
            .http
            .post(self.mission_url("token"))
            .json(&json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await?;
        let body: TokenResponse = check("get_token", response).await?.json().await?;
        Ok(Token(body.token))
    }

    async fn add_marker(&self, token: &Token, feature: &Feature) -> Result<MarkerId, MarkerError> {
        let response = self
            .http
            .post(self.mission_url("geomarkers"))
            .bearer_auth(&token.0)
            .json(&json!({ "feature": feature }))
            .send()
            .await?;
        let body: AddResponse = check("add_marker", response).await?.json().await?;
        parse_id(body.id)
    }

    async fn modify_marker(
        &self,
        token: &Token,
        feature: &Feature,
        id: &MarkerId,
    ) -> Result<(), MarkerError> {
        let response = self
            .http
            .put(self.marker_url(id))
            .bearer_auth(&token.0)
            .json(&json!({ "feature": feature }))
            .send()
            .await?;
        check("modify_marker", response).await?;
        Ok(())
    }

    async fn delete_marker(&self, token: &Token, id: &MarkerId) -> Result<(), MarkerError> {
        let response = self
            .http
            .delete(self.marker_url(id))
            .bearer_auth(&token.0)
            .send()
            .await?;
        let status = response.status();
        if !delete_succeeded(status) {
            check("delete_marker", response).await?;
        } else if !status.is_success() {
            log::debug!("marker {} already gone ({})", id, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PlaneteClient {
        let config = MarkersConfig {
            base_url: "https://markers.example.org/".into(),
            mission_id: "SILEX".into(),
            ..MarkersConfig::default()
        };
        let credentials = Credentials {
            username: "user".into(),
            password: "secret".into(),
        };
        PlaneteClient::new(&config, credentials).unwrap()
    }

    #[test]
    fn urls_are_mission_scoped() {
        let client = client();
        assert_eq!(
            client.mission_url("token"),
            "https://markers.example.org/api/SILEX/token"
        );
        assert_eq!(
            client.marker_url(&MarkerId("42".into())),
            "https://markers.example.org/api/SILEX/geomarkers/42"
        );
    }

    #[test]
    fn numeric_and_string_ids_are_accepted() {
        assert_eq!(parse_id(json!(17)).unwrap(), MarkerId("17".into()));
        assert_eq!(parse_id(json!("a1")).unwrap(), MarkerId("a1".into()));
        assert!(parse_id(json!(null)).is_err());
    }

    #[test]
    fn missing_marker_counts_as_deleted() {
        assert!(delete_succeeded(StatusCode::OK));
        assert!(delete_succeeded(StatusCode::NO_CONTENT));
        assert!(delete_succeeded(StatusCode::NOT_FOUND));
        assert!(delete_succeeded(StatusCode::GONE));
        assert!(!delete_succeeded(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!delete_succeeded(StatusCode::UNAUTHORIZED));
    }
}
