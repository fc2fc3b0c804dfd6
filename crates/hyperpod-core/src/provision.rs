// Cluster provisioning flow
//
// A create assembles the full cluster plan (groups, SLURM parameters, cluster
// request, template) before anything is written, so every configuration
// error surfaces without side effects. Only then are the artifacts uploaded
// and, in direct mode, the cluster created through the SageMaker API.

use crate::cluster::ClusterService;
use crate::enrich::{enrich_instance_groups, EnrichmentSettings};
use crate::error::ProvisionError;
use crate::group::{GroupKind, InstanceGroup};
use crate::lifecycle::artifact_key_beside;
use crate::request::ClusterRequest;
use crate::settings::combine_settings;
use crate::slurm::{strip_group_types, ProvisioningParameters, PROVISIONING_PARAMETERS_FILE};
use crate::store::{s3_uri, ArtifactStore, DeleteStatus};
use crate::subnets::SubnetDirectory;
use crate::template::{render_cluster_template, template_url, TEMPLATE_CONTENT_TYPE, TEMPLATE_KEY};
use hyperpod_config::{CreationMode, Orchestrator, ProvisionerConfig};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CREATING: &str = "Creating";

/// Everything a create would write, computed without side effects
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub request: ClusterRequest,
    pub provisioning_parameters: Option<ProvisioningParameters>,
    pub template: String,
}

/// Result of a successful create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub cluster_name: String,
    /// Set in template mode
    pub template_url: Option<String>,
    /// Set in direct mode
    pub cluster_arn: Option<String>,
    pub cluster_status: String,
    pub message: String,
}

impl CreateOutcome {
    /// The `Data` returned to CloudFormation
    pub fn response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("Status".into(), json!("SUCCESS"));
        data.insert(
            "Reason".into(),
            json!("HyperPod cluster creation initiated successfully"),
        );
        data.insert("ClusterName".into(), json!(self.cluster_name));
        if let Some(url) = &self.template_url {
            data.insert("TemplateUrl".into(), json!(url));
        }
        if let Some(arn) = &self.cluster_arn {
            data.insert("ClusterArn".into(), json!(arn));
        }
        data.insert("ClusterStatus".into(), json!(self.cluster_status));
        data.insert("Message".into(), json!(self.message));
        data
    }
}

/// Result of a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub message: String,
}

impl DeleteOutcome {
    pub fn response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("Message".into(), json!(self.message));
        data
    }
}

/// Computes groups and cluster plans; never writes anything
pub struct ClusterPlanner<'a, D: ?Sized> {
    config: &'a ProvisionerConfig,
    subnets: &'a D,
}

impl<'a, D> ClusterPlanner<'a, D>
where
    D: SubnetDirectory + ?Sized,
{
    pub fn new(config: &'a ProvisionerConfig, subnets: &'a D) -> Self {
        Self { config, subnets }
    }

    /// Combined and enriched groups of one kind
    pub async fn instance_groups(
        &self,
        kind: GroupKind,
    ) -> Result<Vec<InstanceGroup>, ProvisionError> {
        let fragments = match kind {
            GroupKind::Standard => &self.config.instance_groups.settings,
            GroupKind::Restricted => &self.config.instance_groups.restricted_settings,
        };

        let entries = combine_settings(fragments);
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let settings = EnrichmentSettings::from_config(self.config);
        let enriched = enrich_instance_groups(entries, kind, &settings, self.subnets).await?;
        info!(kind = ?kind, count = enriched.len(), "Enriched instance groups");
        Ok(enriched)
    }

    /// Build the whole cluster plan
    pub async fn plan(&self) -> Result<ClusterPlan, ProvisionError> {
        let mut instance_groups = self.instance_groups(GroupKind::Standard).await?;
        let restricted_groups = self.instance_groups(GroupKind::Restricted).await?;

        let provisioning_parameters = match self.config.cluster.orchestrator {
            Orchestrator::Slurm => {
                let params =
                    ProvisioningParameters::from_groups(&instance_groups, &self.config.fsx)?;
                strip_group_types(&mut instance_groups);
                Some(params)
            }
            Orchestrator::Eks => None,
        };

        let request = ClusterRequest::build(self.config, instance_groups, restricted_groups)?;
        let template = render_cluster_template(&request)?;

        Ok(ClusterPlan {
            request,
            provisioning_parameters,
            template,
        })
    }
}

/// Writes and removes a cluster and its artifacts
pub struct Provisioner<'a, D: ?Sized, S: ?Sized, C: ?Sized> {
    planner: ClusterPlanner<'a, D>,
    config: &'a ProvisionerConfig,
    store: &'a S,
    clusters: &'a C,
}

impl<'a, D, S, C> Provisioner<'a, D, S, C>
where
    D: SubnetDirectory + ?Sized,
    S: ArtifactStore + ?Sized,
    C: ClusterService + ?Sized,
{
    pub fn new(
        config: &'a ProvisionerConfig,
        subnets: &'a D,
        store: &'a S,
        clusters: &'a C,
    ) -> Self {
        Self {
            planner: ClusterPlanner::new(config, subnets),
            config,
            store,
            clusters,
        }
    }

    /// Create (or update) the cluster the way the configured mode asks for
    pub async fn create(&self) -> Result<CreateOutcome, ProvisionError> {
        let plan = self.planner.plan().await?;
        match self.config.cluster.mode {
            CreationMode::Template => self.create_from_template(plan).await,
            CreationMode::Direct => self.create_directly(plan).await,
        }
    }

    async fn create_from_template(&self, plan: ClusterPlan) -> Result<CreateOutcome, ProvisionError> {
        let bucket = self
            .bucket()
            .ok_or(ProvisionError::MissingBucket {
                artifact: TEMPLATE_KEY,
            })?;

        if let Some(params) = &plan.provisioning_parameters {
            self.upload_provisioning_parameters(bucket, params).await?;
        }

        info!(cluster = %plan.request.name(), "Uploading cluster template");
        self.upload(
            bucket,
            TEMPLATE_KEY,
            plan.template.into_bytes(),
            Some(TEMPLATE_CONTENT_TYPE),
        )
        .await?;

        let cluster_name = plan.request.name().to_string();
        Ok(CreateOutcome {
            message: format!("Cluster {} creation initiated", cluster_name),
            cluster_name,
            template_url: Some(template_url(bucket)),
            cluster_arn: None,
            cluster_status: CREATING.to_string(),
        })
    }

    /// CreateCluster, unless a cluster with this name already exists (a
    /// retried Create or an Update)
    async fn create_directly(&self, plan: ClusterPlan) -> Result<CreateOutcome, ProvisionError> {
        let name = plan.request.name().to_string();

        if let Some(existing) = self
            .clusters
            .describe_cluster(&name)
            .await
            .map_err(|e| cluster_error("describe", &name, e))?
        {
            warn!(
                cluster = %name,
                status = %existing.status,
                "Cluster already exists; leaving it unchanged"
            );
            return Ok(CreateOutcome {
                message: format!("Cluster {} already exists", name),
                cluster_name: name,
                template_url: None,
                cluster_arn: Some(existing.arn),
                cluster_status: existing.status,
            });
        }

        if let Some(params) = &plan.provisioning_parameters {
            let bucket = self.bucket().ok_or(ProvisionError::MissingBucket {
                artifact: PROVISIONING_PARAMETERS_FILE,
            })?;
            self.upload_provisioning_parameters(bucket, params).await?;
        }

        info!(cluster = %name, "Calling CreateCluster");
        let arn = self
            .clusters
            .create_cluster(&plan.request)
            .await
            .map_err(|e| cluster_error("create", &name, e))?;
        info!(cluster = %name, arn = %arn, "Cluster creation started");

        Ok(CreateOutcome {
            message: format!("Cluster {} creation initiated", name),
            cluster_name: name,
            template_url: None,
            cluster_arn: Some(arn),
            cluster_status: CREATING.to_string(),
        })
    }

    /// Remove what a create produced.
    ///
    /// Artifact cleanup never fails; failures are reported in the message.
    /// In direct mode the cluster is deleted first and the call waits until
    /// SageMaker no longer knows it, which can fail or time out.
    pub async fn delete(&self) -> Result<DeleteOutcome, ProvisionError> {
        let keys = self.artifact_keys();
        match self.config.cluster.mode {
            CreationMode::Template => Ok(self.delete_artifacts(&keys).await),
            CreationMode::Direct => {
                let cluster_message = self.delete_cluster().await?;
                if keys.is_empty() {
                    return Ok(DeleteOutcome {
                        deleted: Vec::new(),
                        message: cluster_message,
                    });
                }
                let artifacts = self.delete_artifacts(&keys).await;
                Ok(DeleteOutcome {
                    message: format!("{}; {}", cluster_message, artifacts.message),
                    deleted: artifacts.deleted,
                })
            }
        }
    }

    fn artifact_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.config.cluster.mode == CreationMode::Template {
            keys.push(TEMPLATE_KEY.to_string());
        }
        if self.config.cluster.orchestrator == Orchestrator::Slurm {
            keys.push(artifact_key_beside(
                self.config.artifacts.on_create_path.as_deref(),
                PROVISIONING_PARAMETERS_FILE,
            ));
        }
        keys
    }

    async fn delete_artifacts(&self, keys: &[String]) -> DeleteOutcome {
        let Some(bucket) = self.bucket() else {
            warn!("S3_BUCKET_NAME not set; nothing to delete");
            return DeleteOutcome {
                deleted: Vec::new(),
                message: "S3 bucket name not provided, nothing to delete".to_string(),
            };
        };

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for key in keys {
            let uri = s3_uri(bucket, key);
            match self.store.delete_object(bucket, key).await {
                Ok(DeleteStatus::Deleted) => {
                    info!(uri = %uri, "Deleted artifact");
                    deleted.push(uri);
                }
                Ok(DeleteStatus::NotFound) => {
                    info!(uri = %uri, "Artifact not found, nothing to delete");
                }
                Err(e) => {
                    warn!(uri = %uri, error = %format!("{:#}", e), "Failed to delete artifact");
                    failures.push(format!("{}: {:#}", uri, e));
                }
            }
        }

        let mut message = if deleted.is_empty() {
            "No files found to delete".to_string()
        } else {
            format!("Successfully deleted files: {}", deleted.join(", "))
        };
        if !failures.is_empty() {
            message.push_str(&format!("; failed to delete: {}", failures.join(", ")));
        }

        DeleteOutcome { deleted, message }
    }

    async fn delete_cluster(&self) -> Result<String, ProvisionError> {
        let Some(name) = self
            .config
            .cluster
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
        else {
            warn!("HYPER_POD_CLUSTER_NAME not set; no cluster to delete");
            return Ok("Cluster name not provided, nothing to delete".to_string());
        };
        let not_found = || format!("Cluster {} not found, nothing to delete", name);

        match self
            .clusters
            .describe_cluster(name)
            .await
            .map_err(|e| cluster_error("describe", name, e))?
        {
            Some(existing) => {
                info!(cluster = %name, status = %existing.status, "Deleting cluster");
            }
            None => {
                info!(cluster = %name, "Cluster not found, nothing to delete");
                return Ok(not_found());
            }
        }

        let status = self
            .clusters
            .delete_cluster(name)
            .await
            .map_err(|e| cluster_error("delete", name, e))?;
        if status == DeleteStatus::NotFound {
            return Ok(not_found());
        }

        self.wait_until_deleted(name).await?;
        Ok(format!("Cluster {} successfully deleted", name))
    }

    async fn wait_until_deleted(&self, name: &str) -> Result<(), ProvisionError> {
        let interval = Duration::from_secs(self.config.cluster.delete_poll_interval_secs);
        let timeout = Duration::from_secs(self.config.cluster.delete_timeout_secs);
        let started = Instant::now();

        loop {
            let Some(existing) = self
                .clusters
                .describe_cluster(name)
                .await
                .map_err(|e| cluster_error("describe", name, e))?
            else {
                info!(cluster = %name, "Cluster deleted");
                return Ok(());
            };

            if started.elapsed() >= timeout {
                return Err(ProvisionError::DeleteTimeout {
                    cluster: name.to_string(),
                    waited_secs: self.config.cluster.delete_timeout_secs,
                });
            }

            debug!(
                cluster = %name,
                status = %existing.status,
                wait_secs = interval.as_secs(),
                "Cluster still exists; waiting"
            );
            tokio::time::sleep(interval).await;
        }
    }

    fn bucket(&self) -> Option<&'a str> {
        self.config
            .artifacts
            .bucket
            .as_deref()
            .filter(|bucket| !bucket.trim().is_empty())
    }

    async fn upload_provisioning_parameters(
        &self,
        bucket: &str,
        params: &ProvisioningParameters,
    ) -> Result<(), ProvisionError> {
        let key = artifact_key_beside(
            self.config.artifacts.on_create_path.as_deref(),
            PROVISIONING_PARAMETERS_FILE,
        );
        let body = params.to_json_pretty()?.into_bytes();
        self.upload(bucket, &key, body, None).await
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ProvisionError> {
        let uri = s3_uri(bucket, key);
        self.store
            .put_object(bucket, key, body, content_type)
            .await
            .map_err(|e| ProvisionError::Upload {
                uri: uri.clone(),
                message: format!("{:#}", e),
            })?;
        info!(uri = %uri, "Uploaded artifact");
        Ok(())
    }
}

fn cluster_error(action: &'static str, cluster: &str, error: anyhow::Error) -> ProvisionError {
    ProvisionError::Cluster {
        action,
        cluster: cluster.to_string(),
        message: format!("{:#}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterSummary;
    use crate::error::{EnrichError, RequestError};
    use crate::subnets::{StaticSubnetDirectory, SubnetPlacement};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use hyperpod_config::SettingsFragment;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Upload {
        bucket: String,
        key: String,
        body: String,
        content_type: Option<String>,
    }

    #[derive(Default)]
    struct MockStore {
        uploads: Mutex<Vec<Upload>>,
        existing: HashSet<String>,
        broken: HashSet<String>,
    }

    #[async_trait]
    impl ArtifactStore for MockStore {
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: Option<&str>,
        ) -> Result<()> {
            if self.broken.contains(key) {
                bail!("AccessDenied");
            }
            self.uploads.lock().unwrap().push(Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body: String::from_utf8(body).unwrap(),
                content_type: content_type.map(str::to_string),
            });
            Ok(())
        }

        async fn delete_object(&self, _bucket: &str, key: &str) -> Result<DeleteStatus> {
            if self.broken.contains(key) {
                bail!("AccessDenied");
            }
            if self.existing.contains(key) {
                Ok(DeleteStatus::Deleted)
            } else {
                Ok(DeleteStatus::NotFound)
            }
        }
    }

    /// Reports the cluster as present for `remaining_describes` more calls
    #[derive(Default)]
    struct MockClusters {
        created: Mutex<Vec<Value>>,
        deleted: Mutex<Vec<String>>,
        remaining_describes: Mutex<usize>,
        fail_create: bool,
    }

    impl MockClusters {
        fn existing(describes: usize) -> Self {
            Self {
                remaining_describes: Mutex::new(describes),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ClusterService for MockClusters {
        async fn create_cluster(&self, request: &ClusterRequest) -> Result<String> {
            if self.fail_create {
                bail!("ValidationException: bad instance type");
            }
            self.created
                .lock()
                .unwrap()
                .push(serde_json::to_value(request).unwrap());
            Ok(format!(
                "arn:aws:sagemaker:us-west-2:123456789012:cluster/{}",
                request.name()
            ))
        }

        async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterSummary>> {
            let mut remaining = self.remaining_describes.lock().unwrap();
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
            Ok(Some(ClusterSummary {
                arn: format!("arn:aws:sagemaker:us-west-2:123456789012:cluster/{}", name),
                status: "InService".to_string(),
            }))
        }

        async fn delete_cluster(&self, name: &str) -> Result<DeleteStatus> {
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(DeleteStatus::Deleted)
        }
    }

    fn directory() -> StaticSubnetDirectory {
        StaticSubnetDirectory::new(vec![
            SubnetPlacement::new("subnet-a", "usw2-az1"),
            SubnetPlacement::new("subnet-b", "usw2-az2"),
        ])
    }

    fn eks_config() -> ProvisionerConfig {
        let mut config = ProvisionerConfig::default();
        config.cluster.name = Some("ml-cluster".to_string());
        config.cluster.node_recovery = Some("Automatic".to_string());
        config.cluster.eks_cluster_arn =
            Some("arn:aws:eks:us-west-2:123456789012:cluster/ml".to_string());
        config.network.security_group_ids = vec!["sg-1".to_string()];
        config.network.private_subnet_ids = vec!["subnet-a".to_string(), "subnet-b".to_string()];
        config.artifacts.bucket = Some("artifacts".to_string());
        config.artifacts.on_create_path = Some("lifecycle/on_create.sh".to_string());
        config.instance_groups.execution_role = Some("hyperpod-role".to_string());
        config.instance_groups.settings = vec![SettingsFragment::new(
            "INSTANCE_GROUP_SETTINGS1",
            r#"[{"InstanceGroupName":"workers","InstanceType":"ml.g5.8xlarge","TargetAvailabilityZoneId":"usw2-az2"}]"#,
        )];
        config.instance_groups.restricted_settings = vec![SettingsFragment::new(
            "RIG_SETTINGS1",
            r#"[{"InstanceGroupName":"rig"}]"#,
        )];
        config
    }

    fn slurm_config() -> ProvisionerConfig {
        let mut config = eks_config();
        config.cluster.orchestrator = Orchestrator::Slurm;
        config.instance_groups.restricted_settings.clear();
        config.instance_groups.settings = vec![SettingsFragment::new(
            "INSTANCE_GROUP_SETTINGS1",
            r#"[
                {"InstanceGroupName":"controller","InstanceGroupType":"Controller","InstanceType":"ml.m5.xlarge"},
                {"InstanceGroupName":"gpu","InstanceGroupType":"Compute","InstanceType":"ml.p5.48xlarge"}
            ]"#,
        )];
        config
    }

    fn direct(mut config: ProvisionerConfig) -> ProvisionerConfig {
        config.cluster.mode = CreationMode::Direct;
        config.cluster.delete_poll_interval_secs = 0;
        config.cluster.delete_timeout_secs = 60;
        config
    }

    fn template_properties(upload: &Upload) -> Value {
        let template: Value = serde_yaml::from_str(&upload.body).unwrap();
        template["Resources"]["NewHyperPodCluster"]["Properties"].clone()
    }

    #[tokio::test]
    async fn test_create_eks_uploads_template() {
        let config = eks_config();
        let store = MockStore::default();
        let clusters = MockClusters::default();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap();

        assert_eq!(
            outcome.template_url.as_deref(),
            Some("https://artifacts.s3.amazonaws.com/hyperpod-cluster-template.yaml")
        );
        assert_eq!(outcome.cluster_arn, None);
        assert!(clusters.created.lock().unwrap().is_empty());

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bucket, "artifacts");
        assert_eq!(uploads[0].key, TEMPLATE_KEY);
        assert_eq!(uploads[0].content_type.as_deref(), Some("text/yaml"));

        let properties = template_properties(&uploads[0]);
        let workers = &properties["InstanceGroups"][0];
        assert_eq!(workers["ExecutionRole"], "hyperpod-role");
        assert_eq!(
            workers["OverrideVpcConfig"],
            json!({"SecurityGroupIds": ["sg-1"], "Subnets": ["subnet-b"]})
        );
        assert!(workers.get("TargetAvailabilityZoneId").is_none());

        let rig = &properties["RestrictedInstanceGroups"][0];
        assert_eq!(rig["ExecutionRole"], "hyperpod-role");
        assert!(rig.get("LifeCycleConfig").is_none());
    }

    #[tokio::test]
    async fn test_create_slurm_uploads_parameters_first() {
        let config = slurm_config();
        let store = MockStore::default();
        let clusters = MockClusters::default();
        Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap();

        let uploads = store.uploads.lock().unwrap();
        let keys: Vec<_> = uploads.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["lifecycle/provisioning_parameters.json", TEMPLATE_KEY]
        );

        let params: Value = serde_json::from_str(&uploads[0].body).unwrap();
        assert_eq!(params["controller_group"], "controller");
        assert_eq!(params["worker_groups"][0]["partition_name"], "ml.p5.48xlarge");

        let properties = template_properties(&uploads[1]);
        assert!(properties.get("Orchestrator").is_none());
        for group in properties["InstanceGroups"].as_array().unwrap() {
            assert!(group.get("InstanceGroupType").is_none());
            assert_eq!(group["LifeCycleConfig"]["SourceS3Uri"], "s3://artifacts/lifecycle");
        }
    }

    #[tokio::test]
    async fn test_invalid_configuration_writes_nothing() {
        let mut config = eks_config();
        config.cluster.node_recovery = None;
        let store = MockStore::default();
        let clusters = MockClusters::default();
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Request(RequestError::MissingNodeRecovery)
        ));

        let mut config = eks_config();
        config.network.private_subnet_ids = vec!["subnet-z".to_string()];
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Enrich(EnrichError::AzTargetingUnavailable { .. })
        ));

        let mut config = eks_config();
        config.artifacts.bucket = None;
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingBucket { .. }));

        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_names_the_object() {
        let config = eks_config();
        let store = MockStore {
            broken: HashSet::from([TEMPLATE_KEY.to_string()]),
            ..Default::default()
        };
        let clusters = MockClusters::default();
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to upload s3://artifacts/hyperpod-cluster-template.yaml: AccessDenied"
        );
    }

    #[test]
    fn test_create_response_data() {
        let outcome = CreateOutcome {
            cluster_name: "ml-cluster".to_string(),
            template_url: Some(template_url("artifacts")),
            cluster_arn: None,
            cluster_status: "Creating".to_string(),
            message: "Cluster ml-cluster creation initiated".to_string(),
        };
        let data = outcome.response_data();
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Status", "Reason", "ClusterName", "TemplateUrl", "ClusterStatus", "Message"]
        );
        assert_eq!(data["Message"], "Cluster ml-cluster creation initiated");
    }

    #[tokio::test]
    async fn test_delete_slurm_artifacts() {
        let config = slurm_config();
        let store = MockStore {
            existing: HashSet::from([
                TEMPLATE_KEY.to_string(),
                "lifecycle/provisioning_parameters.json".to_string(),
            ]),
            ..Default::default()
        };
        let clusters = MockClusters::default();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();
        assert_eq!(
            outcome.message,
            "Successfully deleted files: s3://artifacts/hyperpod-cluster-template.yaml, \
             s3://artifacts/lifecycle/provisioning_parameters.json"
        );
    }

    #[tokio::test]
    async fn test_template_delete_never_fails() {
        let mut config = eks_config();
        config.artifacts.bucket = None;
        let store = MockStore::default();
        let clusters = MockClusters::default();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();
        assert_eq!(outcome.message, "S3 bucket name not provided, nothing to delete");

        let config = eks_config();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();
        assert_eq!(outcome.message, "No files found to delete");

        let store = MockStore {
            broken: HashSet::from([TEMPLATE_KEY.to_string()]),
            ..Default::default()
        };
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();
        assert!(outcome.deleted.is_empty());
        assert!(outcome.message.contains("AccessDenied"));
        assert_eq!(outcome.response_data()["Message"], json!(outcome.message));
    }

    #[tokio::test]
    async fn test_direct_create_calls_sagemaker() {
        let config = direct(eks_config());
        let store = MockStore::default();
        let clusters = MockClusters::default();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap();

        assert_eq!(
            outcome.cluster_arn.as_deref(),
            Some("arn:aws:sagemaker:us-west-2:123456789012:cluster/ml-cluster")
        );
        assert_eq!(outcome.template_url, None);
        assert!(store.uploads.lock().unwrap().is_empty());

        let data = outcome.response_data();
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Status", "Reason", "ClusterName", "ClusterArn", "ClusterStatus", "Message"]
        );

        let created = clusters.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["ClusterName"], "ml-cluster");
        assert_eq!(
            created[0]["Orchestrator"],
            json!({"Eks": {"ClusterArn": "arn:aws:eks:us-west-2:123456789012:cluster/ml"}})
        );
        assert_eq!(
            created[0]["InstanceGroups"][0]["OverrideVpcConfig"],
            json!({"SecurityGroupIds": ["sg-1"], "Subnets": ["subnet-b"]})
        );
    }

    #[tokio::test]
    async fn test_direct_create_slurm_uploads_only_parameters() {
        let config = direct(slurm_config());
        let store = MockStore::default();
        let clusters = MockClusters::default();
        Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap();

        let uploads = store.uploads.lock().unwrap();
        let keys: Vec<_> = uploads.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, vec!["lifecycle/provisioning_parameters.json"]);

        let created = clusters.created.lock().unwrap();
        for group in created[0]["InstanceGroups"].as_array().unwrap() {
            assert!(group.get("InstanceGroupType").is_none());
        }
    }

    #[tokio::test]
    async fn test_direct_create_keeps_existing_cluster() {
        let config = direct(eks_config());
        let store = MockStore::default();
        let clusters = MockClusters::existing(1);
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap();

        assert!(clusters.created.lock().unwrap().is_empty());
        assert_eq!(outcome.cluster_status, "InService");
        assert_eq!(outcome.message, "Cluster ml-cluster already exists");
    }

    #[tokio::test]
    async fn test_direct_create_failure_names_the_cluster() {
        let config = direct(eks_config());
        let store = MockStore::default();
        let clusters = MockClusters {
            fail_create: true,
            ..Default::default()
        };
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .create()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to create cluster ml-cluster: ValidationException: bad instance type"
        );
    }

    #[tokio::test]
    async fn test_direct_delete_polls_until_gone() {
        let config = direct(eks_config());
        let store = MockStore::default();
        let clusters = MockClusters::existing(3);
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();

        assert_eq!(outcome.message, "Cluster ml-cluster successfully deleted");
        assert_eq!(*clusters.deleted.lock().unwrap(), vec!["ml-cluster".to_string()]);
        assert_eq!(*clusters.remaining_describes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_direct_delete_of_missing_cluster() {
        let config = direct(eks_config());
        let store = MockStore::default();
        let clusters = MockClusters::default();
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();

        assert_eq!(outcome.message, "Cluster ml-cluster not found, nothing to delete");
        assert!(clusters.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_delete_times_out() {
        let mut config = direct(eks_config());
        config.cluster.delete_timeout_secs = 0;
        let store = MockStore::default();
        let clusters = MockClusters::existing(usize::MAX);
        let err = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DeleteTimeout { waited_secs: 0, .. }));
        assert_eq!(clusters.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_direct_delete_slurm_also_removes_parameters() {
        let config = direct(slurm_config());
        let store = MockStore {
            existing: HashSet::from(["lifecycle/provisioning_parameters.json".to_string()]),
            ..Default::default()
        };
        let clusters = MockClusters::existing(1);
        let outcome = Provisioner::new(&config, &directory(), &store, &clusters)
            .delete()
            .await
            .unwrap();

        assert_eq!(
            outcome.message,
            "Cluster ml-cluster successfully deleted; Successfully deleted files: \
             s3://artifacts/lifecycle/provisioning_parameters.json"
        );
        assert_eq!(
            outcome.deleted,
            vec!["s3://artifacts/lifecycle/provisioning_parameters.json".to_string()]
        );
    }
}
