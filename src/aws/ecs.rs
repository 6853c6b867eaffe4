//! Calls to the ECS control plane: cluster and service enumeration, plus
//! desired-count reads and writes.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::Client as EcsClient;
use snafu::{OptionExt, ResultExt};

#[async_trait]
pub(crate) trait EcsApi {
    /// Lists the ARNs of every cluster in the account and region.
    async fn list_clusters(&self) -> Result<Vec<String>>;

    /// Lists the ARNs of every service in the given cluster.
    async fn list_services(&self, cluster_arn: &str) -> Result<Vec<String>>;

    /// Returns the service's current desired task count.
    async fn desired_count(&self, cluster_arn: &str, service_name: &str) -> Result<i32>;

    /// Sets the service's desired task count.
    async fn set_desired_count(
        &self,
        cluster_arn: &str,
        service_name: &str,
        desired: i32,
    ) -> Result<()>;
}

pub(crate) struct Ecs {
    client: EcsClient,
}

impl Ecs {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Self {
            client: EcsClient::new(config),
        }
    }
}

#[async_trait]
impl EcsApi for Ecs {
    async fn list_clusters(&self) -> Result<Vec<String>> {
        let mut cluster_arns = Vec::new();
        let mut pages = self.client.list_clusters().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context(error::ListClustersSnafu)?;
            cluster_arns.extend(page.cluster_arns.unwrap_or_default());
        }
        Ok(cluster_arns)
    }

    async fn list_services(&self, cluster_arn: &str) -> Result<Vec<String>> {
        let mut service_arns = Vec::new();
        let mut pages = self
            .client
            .list_services()
            .cluster(cluster_arn)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.context(error::ListServicesSnafu { cluster_arn })?;
            service_arns.extend(page.service_arns.unwrap_or_default());
        }
        Ok(service_arns)
    }

    async fn desired_count(&self, cluster_arn: &str, service_name: &str) -> Result<i32> {
        let response = self
            .client
            .describe_services()
            .cluster(cluster_arn)
            .services(service_name)
            .send()
            .await
            .context(error::DescribeServiceSnafu { service_name })?;

        let service = response
            .services
            .unwrap_or_default()
            .into_iter()
            .next()
            .context(error::MissingInResponseSnafu {
                request_type: "DescribeServices",
                missing: format!("service {}", service_name),
            })?;

        Ok(service.desired_count)
    }

    async fn set_desired_count(
        &self,
        cluster_arn: &str,
        service_name: &str,
        desired: i32,
    ) -> Result<()> {
        self.client
            .update_service()
            .cluster(cluster_arn)
            .service(service_name)
            .desired_count(desired)
            .send()
            .await
            .context(error::UpdateServiceSnafu { service_name })?;
        Ok(())
    }
}

pub(crate) mod error {
    use aws_sdk_ecs::error::SdkError;
    use aws_sdk_ecs::operation::{
        describe_services::DescribeServicesError, list_clusters::ListClustersError,
        list_services::ListServicesError, update_service::UpdateServiceError,
    };
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to describe service {}: {}", service_name, source))]
        DescribeService {
            service_name: String,
            source: SdkError<DescribeServicesError>,
        },

        #[snafu(display("Failed to list clusters: {}", source))]
        ListClusters {
            source: SdkError<ListClustersError>,
        },

        #[snafu(display("Failed to list services in {}: {}", cluster_arn, source))]
        ListServices {
            cluster_arn: String,
            source: SdkError<ListServicesError>,
        },

        #[snafu(display("Response to {} was missing {}", request_type, missing))]
        MissingInResponse {
            request_type: String,
            missing: String,
        },

        #[snafu(display("Failed to update desired count of {}: {}", service_name, source))]
        UpdateService {
            service_name: String,
            source: SdkError<UpdateServiceError>,
        },
    }
}
pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;
