//! Capture and restore of one ECS service's capacity configuration.
//!
//! On shutdown, the service's desired count (and its autoscaling bounds,
//! when a scalable target is registered) is saved to the parameter store
//! before everything is set to zero. On start, the saved record is read back
//! and re-applied. The record is overwritten on every shutdown and never
//! deleted, so the last snapshot stays available for repeated starts.

use crate::aws::ecs::EcsApi;
use crate::aws::scaling::{CapacityBounds, ScalingApi};
use crate::aws::ssm::SsmApi;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

/// Prefix under which saved configurations live in the parameter store.
const PARAMETER_PREFIX: &str = "/ecs-shutdown-scheduler";

lazy_static! {
    static ref CLUSTER_ARN: Regex = Regex::new(r"^arn:aws:ecs:.+:cluster/(.+)$").unwrap();
    static ref SERVICE_ARN: Regex = Regex::new(r"^arn:aws:ecs:.+:service/.+/(.+)$").unwrap();
}

/// Cluster id and service name extracted from the cluster and service ARNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceIdentity {
    pub(crate) cluster_id: String,
    pub(crate) service_name: String,
}

impl ServiceIdentity {
    pub(crate) fn from_arns(cluster_arn: &str, service_arn: &str) -> Result<Self> {
        let cluster_id = CLUSTER_ARN
            .captures(cluster_arn)
            .and_then(|captures| captures.get(1))
            .context(error::MalformedClusterArnSnafu { arn: cluster_arn })?
            .as_str()
            .to_string();

        // Only new-format service ARNs carry the cluster in their path.
        let service_name = SERVICE_ARN
            .captures(service_arn)
            .and_then(|captures| captures.get(1))
            .context(error::MalformedServiceArnSnafu { arn: service_arn })?
            .as_str()
            .to_string();

        Ok(Self {
            cluster_id,
            service_name,
        })
    }

    /// Resource id used by Application Auto Scaling for this service.
    fn resource_id(&self) -> String {
        format!("service/{}/{}", self.cluster_id, self.service_name)
    }

    /// Parameter store name holding this service's saved configuration.
    fn parameter_name(&self) -> String {
        format!(
            "{}/{}-{}",
            PARAMETER_PREFIX, self.cluster_id, self.service_name
        )
    }
}

/// Snapshot of a service's capacity settings, stored as the JSON value of an
/// SSM parameter. Minimum and Maximum are present only for services with a
/// registered scalable target.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SavedConfiguration {
    #[serde(rename = "Minimum", skip_serializing_if = "Option::is_none")]
    pub(crate) minimum: Option<i32>,
    #[serde(rename = "Desired")]
    pub(crate) desired: i32,
    #[serde(rename = "Maximum", skip_serializing_if = "Option::is_none")]
    pub(crate) maximum: Option<i32>,
}

/// Shuts down or restarts one ECS service, saving and restoring its capacity
/// configuration through the parameter store.
pub(crate) struct ServiceStateToggle<'a> {
    ecs: &'a dyn EcsApi,
    scaling: &'a dyn ScalingApi,
    ssm: &'a dyn SsmApi,
    cluster_arn: String,
    identity: ServiceIdentity,
    /// Bounds of the registered scalable target, if the service has one.
    /// Resolved once at construction and fixed for the life of the toggle.
    autoscaling: Option<CapacityBounds>,
}

impl<'a> ServiceStateToggle<'a> {
    pub(crate) async fn new(
        ecs: &'a dyn EcsApi,
        scaling: &'a dyn ScalingApi,
        ssm: &'a dyn SsmApi,
        cluster_arn: &str,
        service_arn: &str,
    ) -> Result<ServiceStateToggle<'a>> {
        let identity = ServiceIdentity::from_arns(cluster_arn, service_arn)?;

        let autoscaling = scaling
            .scalable_target(&identity.resource_id())
            .await
            .context(error::ScalingSnafu)?;
        match &autoscaling {
            Some(bounds) => debug!(
                "Autoscaling configuration detected for service {}: {:?}",
                identity.service_name, bounds
            ),
            None => debug!(
                "No autoscaling configured for service {}",
                identity.service_name
            ),
        }

        Ok(Self {
            ecs,
            scaling,
            ssm,
            cluster_arn: cluster_arn.to_string(),
            identity,
            autoscaling,
        })
    }

    /// Saves the service's current capacity settings, then zeroes it out.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        let desired = self
            .ecs
            .desired_count(&self.cluster_arn, &self.identity.service_name)
            .await
            .context(error::EcsSnafu)?;

        if desired == 0 {
            info!(
                "Service {} is already shut down, nothing to do",
                self.identity.service_name
            );
            return Ok(());
        }

        match self.autoscaling {
            Some(bounds) => {
                self.save_configuration(&SavedConfiguration {
                    minimum: Some(bounds.minimum),
                    desired,
                    maximum: Some(bounds.maximum),
                })
                .await?;

                // Keep the autoscaler from immediately undoing the shutdown.
                self.scaling
                    .register_target(
                        &self.identity.resource_id(),
                        CapacityBounds {
                            minimum: 0,
                            maximum: 0,
                        },
                    )
                    .await
                    .context(error::ScalingSnafu)?;
            }
            None => {
                self.save_configuration(&SavedConfiguration {
                    minimum: None,
                    desired,
                    maximum: None,
                })
                .await?;
            }
        }

        self.set_desired_count(0).await
    }

    /// Restores the service to the configuration saved at shutdown time.
    pub(crate) async fn start(&self) -> Result<()> {
        let parameter = self.identity.parameter_name();
        let value = self
            .ssm
            .get_parameter(&parameter)
            .await
            .context(error::SsmSnafu)?
            .context(error::MissingSavedConfigurationSnafu {
                parameter: parameter.clone(),
            })?;
        let saved: SavedConfiguration =
            serde_json::from_str(&value).context(error::ParseSavedConfigurationSnafu {
                parameter: parameter.clone(),
            })?;

        if self.autoscaling.is_some() {
            let bounds = CapacityBounds {
                minimum: saved.minimum.context(error::MissingSavedBoundSnafu {
                    parameter: parameter.clone(),
                    bound: "Minimum",
                })?,
                maximum: saved.maximum.context(error::MissingSavedBoundSnafu {
                    parameter: parameter.clone(),
                    bound: "Maximum",
                })?,
            };
            self.scaling
                .register_target(&self.identity.resource_id(), bounds)
                .await
                .context(error::ScalingSnafu)?;
        }

        self.set_desired_count(saved.desired).await?;

        info!(
            "'{}/{}' configuration from parameter store was restored: {:?}",
            self.identity.cluster_id, self.identity.service_name, saved
        );
        Ok(())
    }

    async fn save_configuration(&self, saved: &SavedConfiguration) -> Result<()> {
        let value =
            serde_json::to_string(saved).context(error::SerializeSavedConfigurationSnafu)?;
        let description = format!(
            "Original capacity settings for {}/{}",
            self.identity.cluster_id, self.identity.service_name
        );
        self.ssm
            .put_parameter(&self.identity.parameter_name(), &description, &value)
            .await
            .context(error::SsmSnafu)?;
        info!(
            "Saved configuration for {} to parameter store",
            self.identity.service_name
        );
        Ok(())
    }

    async fn set_desired_count(&self, desired: i32) -> Result<()> {
        self.ecs
            .set_desired_count(&self.cluster_arn, &self.identity.service_name, desired)
            .await
            .context(error::EcsSnafu)?;
        info!(
            "'{}/{}' was set to {}",
            self.identity.cluster_id, self.identity.service_name, desired
        );
        Ok(())
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("ECS call failed: {}", source))]
        Ecs { source: crate::aws::ecs::Error },

        #[snafu(display(
            "Cluster ARN '{}' does not match the expected cluster/<id> shape",
            arn
        ))]
        MalformedClusterArn { arn: String },

        #[snafu(display(
            "Service ARN '{}' does not match the expected service/<cluster>/<name> shape",
            arn
        ))]
        MalformedServiceArn { arn: String },

        #[snafu(display("Saved configuration {} is missing the {} bound", parameter, bound))]
        MissingSavedBound { parameter: String, bound: String },

        #[snafu(display(
            "No saved configuration found under {}; was the service ever shut down by this tool?",
            parameter
        ))]
        MissingSavedConfiguration { parameter: String },

        #[snafu(display("Failed to parse saved configuration {}: {}", parameter, source))]
        ParseSavedConfiguration {
            parameter: String,
            source: serde_json::Error,
        },

        #[snafu(display("Autoscaling call failed: {}", source))]
        Scaling {
            source: crate::aws::scaling::Error,
        },

        #[snafu(display("Failed to serialize configuration: {}", source))]
        SerializeSavedConfiguration { source: serde_json::Error },

        #[snafu(display("Parameter store call failed: {}", source))]
        Ssm { source: crate::aws::ssm::Error },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
