//! Parameter store reads and writes for saved service configurations.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::error::SdkError;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client as SsmClient;
use snafu::{OptionExt, ResultExt};

#[async_trait]
pub(crate) trait SsmApi {
    /// Fetches a parameter's value, or None if no such parameter exists.
    async fn get_parameter(&self, name: &str) -> Result<Option<String>>;

    /// Writes a parameter, overwriting any existing value.
    async fn put_parameter(&self, name: &str, description: &str, value: &str) -> Result<()>;
}

pub(crate) struct Ssm {
    client: SsmClient,
}

impl Ssm {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Self {
            client: SsmClient::new(config),
        }
    }
}

#[async_trait]
impl SsmApi for Ssm {
    async fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        let response = match self.client.get_parameter().name(name).send().await {
            Ok(response) => response,
            Err(e) => {
                // A missing parameter is an expected condition for callers,
                // not a failure of the request itself.
                if matches!(&e, SdkError::ServiceError(context) if context.err().is_parameter_not_found())
                {
                    return Ok(None);
                }
                return Err(e).context(error::GetParameterSnafu { name });
            }
        };

        let value = response
            .parameter
            .and_then(|parameter| parameter.value)
            .context(error::MissingInResponseSnafu {
                request_type: "GetParameter",
                missing: format!("value for parameter {}", name),
            })?;

        Ok(Some(value))
    }

    async fn put_parameter(&self, name: &str, description: &str, value: &str) -> Result<()> {
        self.client
            .put_parameter()
            .name(name)
            .description(description)
            .value(value)
            .r#type(ParameterType::StringList)
            .overwrite(true)
            .send()
            .await
            .context(error::PutParameterSnafu { name })?;
        Ok(())
    }
}

pub(crate) mod error {
    use aws_sdk_ssm::error::SdkError;
    use aws_sdk_ssm::operation::{
        get_parameter::GetParameterError, put_parameter::PutParameterError,
    };
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to fetch SSM parameter {}: {}", name, source))]
        GetParameter {
            name: String,
            source: SdkError<GetParameterError>,
        },

        #[snafu(display("Response to {} was missing {}", request_type, missing))]
        MissingInResponse {
            request_type: String,
            missing: String,
        },

        #[snafu(display("Failed to set SSM parameter {}: {}", name, source))]
        PutParameter {
            name: String,
            source: SdkError<PutParameterError>,
        },
    }
}
pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;
