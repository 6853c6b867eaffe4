//! The aws module owns client construction and the thin trait seams over the
//! three AWS services this tool drives. The traits exist so the scheduling
//! logic can be exercised against in-memory fakes in tests.

pub(crate) mod ecs;
pub(crate) mod scaling;
pub(crate) mod ssm;

use aws_config::SdkConfig;

/// Loads the shared SDK config from the environment; in Lambda, region and
/// credentials come from the execution role.
pub(crate) async fn sdk_config() -> SdkConfig {
    aws_config::load_from_env().await
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory stand-ins for the AWS collaborators. Every write is
    //! recorded so tests can assert on side effects, or on their absence.

    use super::ecs::{self, EcsApi};
    use super::scaling::{self, CapacityBounds, ScalingApi};
    use super::ssm::{self, SsmApi};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakeEcs {
        /// Cluster ARNs returned by list_clusters.
        pub(crate) clusters: Vec<String>,
        /// Service ARNs per cluster ARN.
        pub(crate) services: HashMap<String, Vec<String>>,
        /// Desired count per service name.
        pub(crate) desired: Mutex<HashMap<String, i32>>,
        /// Recorded (service name, new desired count) writes.
        pub(crate) updates: Mutex<Vec<(String, i32)>>,
    }

    #[async_trait]
    impl EcsApi for FakeEcs {
        async fn list_clusters(&self) -> ecs::Result<Vec<String>> {
            Ok(self.clusters.clone())
        }

        async fn list_services(&self, cluster_arn: &str) -> ecs::Result<Vec<String>> {
            Ok(self.services.get(cluster_arn).cloned().unwrap_or_default())
        }

        async fn desired_count(&self, _cluster_arn: &str, service_name: &str) -> ecs::Result<i32> {
            Ok(*self.desired.lock().unwrap().get(service_name).unwrap_or(&0))
        }

        async fn set_desired_count(
            &self,
            _cluster_arn: &str,
            service_name: &str,
            desired: i32,
        ) -> ecs::Result<()> {
            self.desired
                .lock()
                .unwrap()
                .insert(service_name.to_string(), desired);
            self.updates
                .lock()
                .unwrap()
                .push((service_name.to_string(), desired));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeScaling {
        /// Registered bounds per resource id.
        pub(crate) targets: Mutex<HashMap<String, CapacityBounds>>,
        /// Recorded (resource id, bounds) registrations.
        pub(crate) registrations: Mutex<Vec<(String, CapacityBounds)>>,
    }

    impl FakeScaling {
        pub(crate) fn with_target(resource_id: &str, bounds: CapacityBounds) -> Self {
            let fake = Self::default();
            fake.targets
                .lock()
                .unwrap()
                .insert(resource_id.to_string(), bounds);
            fake
        }
    }

    #[async_trait]
    impl ScalingApi for FakeScaling {
        async fn scalable_target(
            &self,
            resource_id: &str,
        ) -> scaling::Result<Option<CapacityBounds>> {
            Ok(self.targets.lock().unwrap().get(resource_id).copied())
        }

        async fn register_target(
            &self,
            resource_id: &str,
            bounds: CapacityBounds,
        ) -> scaling::Result<()> {
            self.targets
                .lock()
                .unwrap()
                .insert(resource_id.to_string(), bounds);
            self.registrations
                .lock()
                .unwrap()
                .push((resource_id.to_string(), bounds));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeSsm {
        /// Parameter value per name.
        pub(crate) parameters: Mutex<HashMap<String, String>>,
        /// Recorded (name, value) writes.
        pub(crate) puts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SsmApi for FakeSsm {
        async fn get_parameter(&self, name: &str) -> ssm::Result<Option<String>> {
            Ok(self.parameters.lock().unwrap().get(name).cloned())
        }

        async fn put_parameter(
            &self,
            name: &str,
            _description: &str,
            value: &str,
        ) -> ssm::Result<()> {
            self.parameters
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
            self.puts
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_string()));
            Ok(())
        }
    }
}
