//! The handler module interprets the trigger's Task directive and walks
//! every whitelisted service in every cluster, shutting it down or starting
//! it back up.

use crate::aws::ecs::EcsApi;
use crate::aws::scaling::ScalingApi;
use crate::aws::ssm::SsmApi;
use crate::service::ServiceStateToggle;
use crate::whitelist::Whitelist;
use log::info;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

/// Invocation payload delivered by the scheduled trigger.
#[derive(Debug, Deserialize)]
pub(crate) struct Invocation {
    #[serde(rename = "Task")]
    task: Option<String>,
}

/// What to do with each whitelisted service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskDirective {
    Shutdown,
    Start,
}

impl TaskDirective {
    fn parse(invocation: &Invocation) -> Result<Self> {
        let value = invocation.task.as_deref().context(error::MissingTaskSnafu)?;
        match value {
            "shutdown" => Ok(Self::Shutdown),
            "start" => Ok(Self::Start),
            _ => error::InvalidTaskSnafu { value }.fail(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Start => "start",
        }
    }
}

/// Returned to the trigger as the invocation result.
#[derive(Debug, Serialize)]
pub(crate) struct Summary {
    pub(crate) task: String,
    pub(crate) processed: usize,
    pub(crate) skipped: usize,
}

/// Common entrypoint from the Lambda runtime. Services are handled strictly
/// one at a time; any failure aborts the rest of the batch.
pub(crate) async fn run(
    invocation: &Invocation,
    ecs: &dyn EcsApi,
    scaling: &dyn ScalingApi,
    ssm: &dyn SsmApi,
    whitelist: &Whitelist,
) -> Result<Summary> {
    let task = TaskDirective::parse(invocation)?;

    let cluster_arns = ecs.list_clusters().await.context(error::EcsSnafu)?;
    if cluster_arns.is_empty() {
        info!("No ECS clusters found, nothing to do");
    }

    let mut processed = 0;
    let mut skipped = 0;
    for cluster_arn in &cluster_arns {
        let service_arns = ecs.list_services(cluster_arn).await.context(error::EcsSnafu)?;

        for service_arn in &service_arns {
            // Checked before any per-service API traffic happens.
            if !whitelist.permits(service_arn) {
                info!("Service {} is not whitelisted, skipping", service_arn);
                skipped += 1;
                continue;
            }

            let service = ServiceStateToggle::new(ecs, scaling, ssm, cluster_arn, service_arn)
                .await
                .context(error::ToggleSnafu)?;
            match task {
                TaskDirective::Shutdown => service.shutdown().await.context(error::ToggleSnafu)?,
                TaskDirective::Start => service.start().await.context(error::ToggleSnafu)?,
            }
            processed += 1;
        }
    }

    Ok(Summary {
        task: task.as_str().to_string(),
        processed,
        skipped,
    })
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to enumerate clusters or services: {}", source))]
        Ecs { source: crate::aws::ecs::Error },

        #[snafu(display(
            "Couldn't interpret Task '{}'; must be one of: shutdown, start",
            value
        ))]
        InvalidTask { value: String },

        #[snafu(display("Invocation payload has no Task field; must be one of: shutdown, start"))]
        MissingTask,

        #[snafu(display("Failed to process service: {}", source))]
        Toggle { source: crate::service::Error },
    }
}
pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::{run, Error, Invocation};
    use crate::aws::fake::{FakeEcs, FakeScaling, FakeSsm};
    use crate::whitelist::Whitelist;

    const CLUSTER_ARN: &str = "arn:aws:ecs:eu-west-1:111122223333:cluster/test-cluster";
    const SERVICE_ARN: &str =
        "arn:aws:ecs:eu-west-1:111122223333:service/test-cluster/test-service";

    fn fake_ecs(desired: i32) -> FakeEcs {
        let mut ecs = FakeEcs {
            clusters: vec![CLUSTER_ARN.to_string()],
            ..FakeEcs::default()
        };
        ecs.services
            .insert(CLUSTER_ARN.to_string(), vec![SERVICE_ARN.to_string()]);
        ecs.desired
            .lock()
            .unwrap()
            .insert("test-service".to_string(), desired);
        ecs
    }

    fn invocation(task: Option<&str>) -> Invocation {
        Invocation {
            task: task.map(String::from),
        }
    }

    #[tokio::test]
    async fn whitelisted_service_is_shut_down() {
        let ecs = fake_ecs(3);
        let scaling = FakeScaling::default();
        let ssm = FakeSsm::default();
        let whitelist = Whitelist::new("test,dev");

        let summary = run(&invocation(Some("shutdown")), &ecs, &scaling, &ssm, &whitelist)
            .await
            .unwrap();

        assert_eq!(summary.task, "shutdown");
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(*ecs.desired.lock().unwrap().get("test-service").unwrap(), 0);
        assert_eq!(ssm.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_whitelisted_service_is_skipped() {
        let ecs = fake_ecs(3);
        let scaling = FakeScaling::default();
        let ssm = FakeSsm::default();
        let whitelist = Whitelist::new("prod");

        let summary = run(&invocation(Some("shutdown")), &ecs, &scaling, &ssm, &whitelist)
            .await
            .unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);
        assert!(ecs.updates.lock().unwrap().is_empty());
        assert!(ssm.puts.lock().unwrap().is_empty());
        assert!(scaling.registrations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let ecs = fake_ecs(3);
        let scaling = FakeScaling::default();
        let ssm = FakeSsm::default();
        let whitelist = Whitelist::new("test");

        let err = run(&invocation(Some("redeploy")), &ecs, &scaling, &ssm, &whitelist)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidTask { value } if value == "redeploy"));
        assert!(ecs.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_task_is_rejected() {
        let ecs = fake_ecs(3);
        let scaling = FakeScaling::default();
        let ssm = FakeSsm::default();
        let whitelist = Whitelist::new("test");

        let err = run(&invocation(None), &ecs, &scaling, &ssm, &whitelist)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingTask));
    }

    #[tokio::test]
    async fn empty_cluster_list_is_a_no_op() {
        let ecs = FakeEcs::default();
        let scaling = FakeScaling::default();
        let ssm = FakeSsm::default();
        let whitelist = Whitelist::new("test");

        let summary = run(&invocation(Some("shutdown")), &ecs, &scaling, &ssm, &whitelist)
            .await
            .unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 0);
    }
}
