// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Marker CRUD against `/1/markers/{dataset}`. All calls are blocking.

use crate::config::HoneyConfig;
use crate::errors::TransmitError;
use crate::honey::Honey;
use crate::transmit::RawRequest;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A time range annotation stored by the collector.
///
/// Unset fields are left out of the payload. `id`, `created_at` and `updated_at` are
/// assigned by the server and only ever read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}

impl Marker {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: i64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn require_id(&self) -> Result<&str, TransmitError> {
        self.id.as_deref().ok_or(TransmitError::MissingMarkerId)
    }
}

impl Honey {
    /// Returns the stored marker, including its server assigned id.
    pub fn create_marker(
        &self,
        marker: &Marker,
        config: &HoneyConfig,
    ) -> Result<Marker, TransmitError> {
        let body = serde_json::to_string(marker)?;
        self.marker_call(RawRequest::marker(Method::POST, config, None, body))
    }

    pub fn update_marker(
        &self,
        marker: &Marker,
        config: &HoneyConfig,
    ) -> Result<Marker, TransmitError> {
        let id = marker.require_id()?;
        let body = serde_json::to_string(marker)?;
        self.marker_call(RawRequest::marker(Method::PUT, config, Some(id), body))
    }

    /// Returns the marker as it was before deletion.
    pub fn remove_marker(
        &self,
        marker: &Marker,
        config: &HoneyConfig,
    ) -> Result<Marker, TransmitError> {
        let id = marker.require_id()?;
        self.marker_call(RawRequest::marker(
            Method::DELETE,
            config,
            Some(id),
            String::new(),
        ))
    }

    pub fn all_markers(&self, config: &HoneyConfig) -> Result<Vec<Marker>, TransmitError> {
        self.marker_call(RawRequest::marker(
            Method::GET,
            config,
            None,
            String::new(),
        ))
    }

    fn marker_call<T: DeserializeOwned>(&self, request: RawRequest) -> Result<T, TransmitError> {
        debug!("Marker request {request}");
        let body = self.engine().submit_blocking(request).result?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::transmit::request::HEADER_TEAM;
    use mockito::{Matcher, Server};
    use reqwest::StatusCode;
    use serde_json::json;

    fn honey() -> Honey {
        Honey::new(Tuning::default()).expect("honey")
    }

    fn config(server: &Server) -> HoneyConfig {
        HoneyConfig::new("WRITE_KEY", "data_set").with_api_host(server.url())
    }

    #[test]
    fn test_unset_fields_are_omitted_from_payload() {
        let marker = Marker {
            id: Some("abc".to_string()),
            created_at: Some("2020-01-01T00:00:00Z".to_string()),
            ..Marker::new("deploy 42").with_start_time(1_600_000_000)
        };
        assert_eq!(
            serde_json::to_value(&marker).expect("serializable"),
            json!({"start_time": 1_600_000_000, "message": "deploy 42"})
        );
    }

    #[test]
    fn test_kind_is_serialized_as_type() {
        let marker = Marker::new("m").with_kind("deploy").with_url("http://ci/1");
        let payload = serde_json::to_value(&marker).expect("serializable");
        assert_eq!(payload["type"], "deploy");
        assert_eq!(payload["url"], "http://ci/1");
        assert!(payload.get("kind").is_none());
    }

    #[test]
    fn test_create_marker() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/1/markers/data_set")
            .match_header(HEADER_TEAM, "WRITE_KEY")
            .match_body(Matcher::Json(json!({
                "start_time": 100,
                "end_time": 200,
                "message": "deploy",
                "type": "deploys"
            })))
            .with_status(201)
            .with_body(
                json!({
                    "start_time": 100,
                    "end_time": 200,
                    "message": "deploy",
                    "type": "deploys",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z",
                    "id": "2xZP4"
                })
                .to_string(),
            )
            .create();

        let marker = Marker::new("deploy")
            .with_start_time(100)
            .with_end_time(200)
            .with_kind("deploys");
        let created = honey()
            .create_marker(&marker, &config(&server))
            .expect("created");

        mock.assert();
        assert_eq!(created.id.as_deref(), Some("2xZP4"));
        assert_eq!(created.message.as_deref(), Some("deploy"));
        assert_eq!(created.url, None);
    }

    #[test]
    fn test_update_and_remove_address_the_id() {
        let mut server = Server::new();
        let body = json!({"message": "renamed", "id": "2xZP4"}).to_string();
        let update = server
            .mock("PUT", "/1/markers/data_set/2xZP4")
            .match_body(Matcher::Json(json!({"message": "renamed"})))
            .with_body(&body)
            .create();
        let remove = server
            .mock("DELETE", "/1/markers/data_set/2xZP4")
            .match_body("")
            .with_body(&body)
            .create();

        let marker = Marker {
            id: Some("2xZP4".to_string()),
            ..Marker::new("renamed")
        };
        let honey = honey();
        let updated = honey
            .update_marker(&marker, &config(&server))
            .expect("updated");
        let removed = honey
            .remove_marker(&updated, &config(&server))
            .expect("removed");

        update.assert();
        remove.assert();
        assert_eq!(removed.id.as_deref(), Some("2xZP4"));
    }

    #[test]
    fn test_update_without_id_never_reaches_the_network() {
        let mut server = Server::new();
        let mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create();

        let result = honey().update_marker(&Marker::new("orphan"), &config(&server));
        assert!(matches!(result, Err(TransmitError::MissingMarkerId)));
        mock.assert();
    }

    #[test]
    fn test_all_markers() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/1/markers/data_set")
            .match_header(HEADER_TEAM, "WRITE_KEY")
            .with_body(
                json!([
                    {"message": "one", "id": "a", "start_time": 1},
                    {"message": "two", "id": "b", "url": null}
                ])
                .to_string(),
            )
            .create();

        let markers = honey().all_markers(&config(&server)).expect("listed");
        mock.assert();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].start_time, Some(1));
        assert_eq!(markers[1].id.as_deref(), Some("b"));
        assert_eq!(markers[1].url, None);
    }

    #[test]
    fn test_malformed_body_is_a_decode_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/1/markers/data_set")
            .with_body("<html>gateway</html>")
            .create();

        let result = honey().all_markers(&config(&server));
        assert!(matches!(result, Err(TransmitError::Decode(_))));
    }

    #[test]
    fn test_unauthorized_is_a_status_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/1/markers/data_set")
            .with_status(401)
            .with_body(r#"{"error":"unknown API key"}"#)
            .create();

        let error = honey()
            .create_marker(&Marker::new("m"), &config(&server))
            .expect_err("rejected");
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
