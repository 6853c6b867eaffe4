//! Application Auto Scaling calls for the ECS service desired-count
//! dimension.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_applicationautoscaling::types::{ScalableDimension, ServiceNamespace};
use aws_sdk_applicationautoscaling::Client as ScalingClient;
use snafu::ResultExt;

/// Min/max task bounds of a scalable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CapacityBounds {
    pub(crate) minimum: i32,
    pub(crate) maximum: i32,
}

#[async_trait]
pub(crate) trait ScalingApi {
    /// Returns the registered bounds for the given resource id, or None if no
    /// scalable target is registered for it.
    async fn scalable_target(&self, resource_id: &str) -> Result<Option<CapacityBounds>>;

    /// Registers (or re-registers) the scalable target with the given bounds.
    async fn register_target(&self, resource_id: &str, bounds: CapacityBounds) -> Result<()>;
}

pub(crate) struct Scaling {
    client: ScalingClient,
}

impl Scaling {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Self {
            client: ScalingClient::new(config),
        }
    }
}

#[async_trait]
impl ScalingApi for Scaling {
    async fn scalable_target(&self, resource_id: &str) -> Result<Option<CapacityBounds>> {
        let response = self
            .client
            .describe_scalable_targets()
            .service_namespace(ServiceNamespace::Ecs)
            .resource_ids(resource_id)
            .scalable_dimension(ScalableDimension::EcsServiceDesiredCount)
            .send()
            .await
            .context(error::DescribeTargetsSnafu { resource_id })?;

        Ok(response
            .scalable_targets
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|target| CapacityBounds {
                minimum: target.min_capacity,
                maximum: target.max_capacity,
            }))
    }

    async fn register_target(&self, resource_id: &str, bounds: CapacityBounds) -> Result<()> {
        self.client
            .register_scalable_target()
            .service_namespace(ServiceNamespace::Ecs)
            .resource_id(resource_id)
            .scalable_dimension(ScalableDimension::EcsServiceDesiredCount)
            .min_capacity(bounds.minimum)
            .max_capacity(bounds.maximum)
            .send()
            .await
            .context(error::RegisterTargetSnafu { resource_id })?;
        Ok(())
    }
}

pub(crate) mod error {
    use aws_sdk_applicationautoscaling::error::SdkError;
    use aws_sdk_applicationautoscaling::operation::{
        describe_scalable_targets::DescribeScalableTargetsError,
        register_scalable_target::RegisterScalableTargetError,
    };
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to describe scalable target {}: {}", resource_id, source))]
        DescribeTargets {
            resource_id: String,
            source: SdkError<DescribeScalableTargetsError>,
        },

        #[snafu(display("Failed to register scalable target {}: {}", resource_id, source))]
        RegisterTarget {
            resource_id: String,
            source: SdkError<RegisterScalableTargetError>,
        },
    }
}
pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;
