// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collector requests and the outcome of executing them.

use crate::codec::{format_timestamp, to_batch, to_json};
use crate::config::HoneyConfig;
use crate::errors::TransmitError;
use crate::event::Event;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::fmt::Display;
use tracing::trace;

pub const HEADER_TEAM: &str = "X-Honeycomb-Team";
pub const HEADER_EVENT_TIME: &str = "X-Honeycomb-Event-Time";
pub const HEADER_SAMPLE_RATE: &str = "X-Honeycomb-Samplerate";

const EVENTS_PATH: &str = "/1/events/";
const BATCH_EVENTS_PATH: &str = "/1/batch/";
const MARKERS_PATH: &str = "/1/markers/";

/// A fully built collector request. Kept around so handlers can inspect what was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl RawRequest {
    /// `POST {api_host}/1/events/{dataset}` with the event's key, time and sample rate headers.
    pub fn event(event: &Event) -> Self {
        Self {
            method: Method::POST,
            url: join_url(event.api_host(), EVENTS_PATH, event.dataset()),
            headers: vec![
                (HEADER_TEAM, event.write_key().to_string()),
                (HEADER_EVENT_TIME, format_timestamp(&event.timestamp())),
                (HEADER_SAMPLE_RATE, event.sample_rate().to_string()),
            ],
            body: to_json(event).to_string(),
        }
    }

    /// `POST {api_host}/1/batch/{dataset}` carrying only the write key header.
    pub fn batch(events: &[Event], config: &HoneyConfig) -> Self {
        Self {
            method: Method::POST,
            url: join_url(&config.api_host, BATCH_EVENTS_PATH, &config.dataset),
            headers: vec![(HEADER_TEAM, config.write_key.clone())],
            body: to_batch(events).to_string(),
        }
    }

    /// Marker requests: `{api_host}/1/markers/{dataset}[/{id}]`. `body` is empty for
    /// delete and list.
    pub fn marker(method: Method, config: &HoneyConfig, id: Option<&str>, body: String) -> Self {
        let mut url = join_url(&config.api_host, MARKERS_PATH, &config.dataset);
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        Self {
            method,
            url,
            headers: vec![(HEADER_TEAM, config.write_key.clone())],
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn header_map(&self) -> Result<HeaderMap, TransmitError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for &(name, ref value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|reason| {
                TransmitError::InvalidHeader {
                    name,
                    reason: reason.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|reason| TransmitError::InvalidHeader {
                    name,
                    reason: reason.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

impl Display for RawRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn join_url(api_host: &str, path: &str, dataset: &str) -> String {
    format!("{}{}{}", api_host.trim_end_matches('/'), path, dataset)
}

/// What the collector answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Outcome of one request: what was sent, what came back (absent on transport
/// failures) and the success/failure union callers branch on.
#[derive(Debug)]
pub struct Delivery {
    pub request: RawRequest,
    pub response: Option<CollectorResponse>,
    pub result: Result<String, TransmitError>,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|response| response.status)
    }
}

/// Runs `request` on the calling thread. Never panics and never retries: every failure
/// is folded into [`Delivery::result`].
pub fn execute(client: &Client, request: RawRequest) -> Delivery {
    let headers = match request.header_map() {
        Ok(headers) => headers,
        Err(err) => {
            return Delivery {
                request,
                response: None,
                result: Err(err),
            }
        }
    };

    trace!("Sending {request}");
    let sent = client
        .request(request.method.clone(), &request.url)
        .headers(headers)
        .body(request.body.clone())
        .send();

    let response = match sent {
        Ok(response) => response,
        Err(err) => {
            return Delivery {
                request,
                response: None,
                result: Err(TransmitError::Transport(err)),
            }
        }
    };

    let status = response.status();
    match response.text() {
        Ok(body) => {
            let result = if status.is_success() {
                Ok(body.clone())
            } else {
                Err(TransmitError::Status {
                    status,
                    body: body.clone(),
                })
            };
            Delivery {
                request,
                response: Some(CollectorResponse { status, body }),
                result,
            }
        }
        Err(err) => Delivery {
            request,
            response: Some(CollectorResponse {
                status,
                body: String::new(),
            }),
            result: Err(TransmitError::Transport(err)),
        },
    }
}
