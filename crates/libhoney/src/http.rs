// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use std::error::Error;

pub const USER_AGENT_VALUE: &str = concat!("libhoney-rust/", env!("CARGO_PKG_VERSION"));

/// Creates a blocking reqwest client builder using rustls TLS.
pub fn create_reqwest_client_builder() -> ClientBuilder {
    Client::builder().use_rustls_tls()
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers
}

/// Builds a reqwest client with optional proxy configuration and timeout.
/// Every request carries the JSON content type and the library user agent.
pub fn build_client(proxy_url: Option<&str>, timeout: Duration) -> Result<Client, Box<dyn Error>> {
    let mut builder = create_reqwest_client_builder()
        .timeout(timeout)
        .default_headers(base_headers());
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_crate_version() {
        assert!(USER_AGENT_VALUE.starts_with("libhoney-rust/"));
        assert!(USER_AGENT_VALUE.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_base_headers() {
        let headers = base_headers();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[USER_AGENT], USER_AGENT_VALUE);
    }

    #[test]
    fn test_build_client_rejects_invalid_proxy() {
        assert!(build_client(Some("::not a url::"), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_build_client_without_proxy() {
        assert!(build_client(None, Duration::from_secs(1)).is_ok());
    }
}
