/*!
`ecs-shutdown-scheduler` stops and restarts whitelisted ECS services on a
schedule, so that non-production capacity isn't paid for outside business
hours.

A scheduled trigger (an EventBridge rule or similar) invokes this Lambda with
a payload like `{"Task": "shutdown"}` or `{"Task": "start"}`. On shutdown,
each whitelisted service's desired count (and its autoscaling bounds, when a
scalable target is registered) is saved to the SSM Parameter Store before
everything is set to zero. On start the saved values are applied back.

Configuration comes from environment variables:
* `WHITELIST`: comma-separated substrings selecting which services to manage
* `LOG_LEVEL`: how much detail to log; from least to most: ERROR, WARN, INFO,
  DEBUG, TRACE (default INFO)
*/

mod aws;
mod handler;
mod service;
mod whitelist;

use lambda_runtime::{service_fn, LambdaEvent};
use log::LevelFilter;
use simplelog::{CombinedLogger, Config as LogConfig, ConfigBuilder, SimpleLogger};
use snafu::ResultExt;
use std::env;
use std::str::FromStr;
use whitelist::Whitelist;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    init_logger()?;

    // Clients are built once per process and reused across invocations.
    let config = aws::sdk_config().await;
    let ecs = aws::ecs::Ecs::new(&config);
    let scaling = aws::scaling::Scaling::new(&config);
    let ssm = aws::ssm::Ssm::new(&config);
    let whitelist = Whitelist::from_env()?;

    lambda_runtime::run(service_fn(|event: LambdaEvent<handler::Invocation>| {
        handle(&ecs, &scaling, &ssm, &whitelist, event)
    }))
    .await
}

async fn handle(
    ecs: &aws::ecs::Ecs,
    scaling: &aws::scaling::Scaling,
    ssm: &aws::ssm::Ssm,
    whitelist: &Whitelist,
    event: LambdaEvent<handler::Invocation>,
) -> Result<handler::Summary, lambda_runtime::Error> {
    Ok(handler::run(&event.payload, ecs, scaling, ssm, whitelist).await?)
}

/// Sets up simplelog based on the LOG_LEVEL environment variable.
fn init_logger() -> Result<(), error::Error> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => LevelFilter::from_str(&value).context(error::ParseLogLevelSnafu { value })?,
        Err(_) => LevelFilter::Info,
    };

    // At INFO, the AWS SDK for Rust floods the log with signing and
    // connection detail; run a second logger that holds those modules to WARN
    // while keeping our own INFO lines.
    match log_level {
        LevelFilter::Info => {
            CombinedLogger::init(vec![
                SimpleLogger::new(
                    LevelFilter::Info,
                    ConfigBuilder::new()
                        .add_filter_ignore_str("aws_config")
                        .add_filter_ignore_str("aws_credential_types")
                        .add_filter_ignore_str("aws_smithy")
                        .add_filter_ignore_str("tracing::span")
                        .build(),
                ),
                SimpleLogger::new(
                    LevelFilter::Warn,
                    ConfigBuilder::new()
                        .add_filter_allow_str("aws_config")
                        .add_filter_allow_str("aws_credential_types")
                        .add_filter_allow_str("aws_smithy")
                        .add_filter_allow_str("tracing::span")
                        .build(),
                ),
            ])
            .context(error::LoggerSnafu)?;
        }
        _ => SimpleLogger::init(log_level, LogConfig::default()).context(error::LoggerSnafu)?,
    }

    Ok(())
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },

        #[snafu(display("Invalid LOG_LEVEL '{}': {}", value, source))]
        ParseLogLevel {
            value: String,
            source: log::ParseLevelError,
        },
    }
}
