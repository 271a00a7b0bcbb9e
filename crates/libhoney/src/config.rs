// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "https://api.honeycomb.io";
pub const DEFAULT_SAMPLE_RATE: u32 = 1;

const DEFAULT_CORE_THREADS: usize = 1;
const DEFAULT_THREAD_COUNT: usize = 20;
const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Destination and sampling settings applied to events and batch requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoneyConfig {
    /// Write key sent as the team header; the collector answers 401 when it is empty or unknown
    pub write_key: String,
    pub dataset: String,
    /// Collector base URL, without a trailing path
    pub api_host: String,
    /// 1-in-N client side sampling hint
    pub sample_rate: u32,
}

impl Default for HoneyConfig {
    fn default() -> Self {
        Self {
            write_key: String::new(),
            dataset: String::new(),
            api_host: DEFAULT_API_HOST.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl HoneyConfig {
    pub fn new(write_key: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let write_key = env::var("HONEYCOMB_WRITE_KEY").unwrap_or_default();
        let dataset = env::var("HONEYCOMB_DATASET").unwrap_or_default();
        let api_host =
            env::var("HONEYCOMB_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        let sample_rate = env::var("HONEYCOMB_SAMPLE_RATE")
            .ok()
            .and_then(|rate| rate.parse::<u32>().ok())
            .unwrap_or(DEFAULT_SAMPLE_RATE);

        let config = Self {
            write_key,
            dataset,
            api_host,
            sample_rate,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.trim().is_empty() {
            return Err(ConfigError::Invalid("dataset cannot be empty".to_string()));
        }

        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "sample rate must be greater than 0".to_string(),
            ));
        }

        if !(self.api_host.starts_with("http://") || self.api_host.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api host '{}' must start with http:// or https://",
                self.api_host
            )));
        }

        Ok(())
    }
}

/// What the engine does with a submission when the queue is full and no worker is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionPolicyKind {
    /// Run the work on the submitting thread.
    #[default]
    Retry,
    /// Discard the work and emit a diagnostic.
    Drop,
}

impl FromStr for RejectionPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "drop" => Ok(Self::Drop),
            _ => Err(ConfigError::Parse {
                var: "HONEYCOMB_REJECTION_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Knobs of the transmission engine. They are read once, when the worker pool starts.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Workers kept alive even when idle
    pub core_threads: usize,
    /// Upper bound on concurrently running workers
    pub thread_count: usize,
    /// Capacity of the queue between producers and workers
    pub max_queue_size: usize,
    /// How long a worker above `core_threads` may stay idle before exiting
    pub keep_alive: Duration,
    pub rejection_policy: RejectionPolicyKind,
    pub request_timeout: Duration,
    /// How long shutdown waits for queued and in-flight work before abandoning it
    pub shutdown_grace: Duration,
    pub https_proxy: Option<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            core_threads: DEFAULT_CORE_THREADS,
            thread_count: DEFAULT_THREAD_COUNT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
            rejection_policy: RejectionPolicyKind::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            https_proxy: None,
        }
    }
}

impl Tuning {
    /// Create tuning from environment variables, falling back to defaults for unparseable numbers
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rejection_policy = match env::var("HONEYCOMB_REJECTION_POLICY") {
            Ok(policy) => policy.parse()?,
            Err(_) => defaults.rejection_policy,
        };

        let tuning = Self {
            core_threads: parse_env("HONEYCOMB_CORE_THREADS").unwrap_or(defaults.core_threads),
            thread_count: parse_env("HONEYCOMB_THREAD_COUNT").unwrap_or(defaults.thread_count),
            max_queue_size: parse_env("HONEYCOMB_MAX_QUEUE_SIZE")
                .unwrap_or(defaults.max_queue_size),
            keep_alive: parse_env("HONEYCOMB_KEEP_ALIVE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.keep_alive),
            rejection_policy,
            request_timeout: parse_env("HONEYCOMB_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            shutdown_grace: parse_env("HONEYCOMB_SHUTDOWN_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
            https_proxy: env::var("HONEYCOMB_HTTPS_PROXY")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
        };

        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::Invalid(
                "thread count must be greater than 0".to_string(),
            ));
        }
        if self.core_threads > self.thread_count {
            return Err(ConfigError::Invalid(format!(
                "core threads ({}) cannot exceed thread count ({})",
                self.core_threads, self.thread_count
            )));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "max queue size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|val| val.trim().parse::<T>().ok())
}
