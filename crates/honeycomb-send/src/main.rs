// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

use clap::Parser;
use libhoney::config::{DEFAULT_API_HOST, DEFAULT_SAMPLE_RATE};
use libhoney::{Event, Honey, HoneyConfig, Submission, Tuning};
use serde_json::Value;
use std::env;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Ship one event to a Honeycomb compatible collector.
#[derive(Debug, Parser)]
#[command(name = "honeycomb-send", version)]
struct Args {
    #[arg(long, env = "HONEYCOMB_WRITE_KEY", hide_env_values = true)]
    write_key: String,

    #[arg(long, env = "HONEYCOMB_DATASET")]
    dataset: String,

    #[arg(long, env = "HONEYCOMB_API_HOST", default_value = DEFAULT_API_HOST)]
    api_host: String,

    #[arg(long, env = "HONEYCOMB_SAMPLE_RATE", default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Go through the worker pool instead of sending on the main thread
    #[arg(long = "async")]
    asynchronous: bool,

    /// Event fields as `key=value`. Values that parse as JSON are sent as JSON.
    #[arg(value_parser = parse_field)]
    fields: Vec<(String, Value)>,
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_logging() {
    let log_level = env::var("HONEYCOMB_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(true)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let config = HoneyConfig::new(args.write_key, args.dataset)
        .with_api_host(args.api_host)
        .with_sample_rate(args.sample_rate);
    if let Err(err) = config.validate() {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    let tuning = match Tuning::from_env() {
        Ok(tuning) => tuning,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let honey = match Honey::new(tuning) {
        Ok(honey) => honey,
        Err(err) => {
            error!("Unable to start transmission engine: {err}");
            return ExitCode::FAILURE;
        }
    };

    let event = Event::from_config(&config).add_fields(args.fields);

    let result = if args.asynchronous {
        let (done, outcome) = mpsc::channel();
        let submission = honey.send_with(
            &event,
            Box::new(move |delivery| {
                let _ = done.send(delivery.result);
            }),
        );
        let report = honey.shutdown();
        debug!("Shutdown report: {report:?}");
        if submission == Submission::Dropped {
            error!("Event was dropped");
            return ExitCode::FAILURE;
        }
        match outcome.try_recv() {
            Ok(result) => result,
            Err(_) => {
                error!("Event was not delivered before shutdown");
                return ExitCode::FAILURE;
            }
        }
    } else {
        honey.blocking_send(&event).result
    };

    match result {
        Ok(_) => {
            info!("Event sent to {}", config.dataset);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Failed to send event: {err}");
            ExitCode::FAILURE
        }
    }
}
