// Lifecycle script location
//
// ON_CREATE_PATH is an object key inside the artifact bucket. SageMaker wants
// it split into a source prefix and a script name; generated artifacts such
// as provisioning_parameters.json are written next to the script.

use hyperpod_config::ArtifactConfig;
use serde_json::{json, Value};

/// The on-create script every standard instance group runs at boot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleScript {
    bucket: String,
    path: String,
}

impl LifecycleScript {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Both the bucket and the script path must be configured and non-blank
    pub fn from_artifacts(artifacts: &ArtifactConfig) -> Option<Self> {
        let bucket = non_blank(artifacts.bucket.as_deref())?;
        let path = non_blank(artifacts.on_create_path.as_deref())?;
        Some(Self::new(bucket, path))
    }

    /// `s3://{bucket}/{dirname}`, or `s3://{bucket}` when the path has no `/`
    pub fn source_s3_uri(&self) -> String {
        match split_key(&self.path) {
            (Some(dir), _) => format!("s3://{}/{}", self.bucket, dir),
            (None, _) => format!("s3://{}", self.bucket),
        }
    }

    /// Script name relative to [`Self::source_s3_uri`]
    pub fn on_create(&self) -> &str {
        split_key(&self.path).1
    }

    /// The `LifeCycleConfig` record of an instance group
    pub fn life_cycle_config(&self) -> Value {
        json!({
            "SourceS3Uri": self.source_s3_uri(),
            "OnCreate": self.on_create(),
        })
    }
}

/// Object key for an artifact stored beside the lifecycle script, or at the
/// bucket root when there is no script directory.
pub fn artifact_key_beside(on_create_path: Option<&str>, file_name: &str) -> String {
    match on_create_path.map(split_key) {
        Some((Some(dir), _)) if !dir.is_empty() => format!("{}/{}", dir, file_name),
        _ => file_name.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Split on the last `/` into (directory, file name)
fn split_key(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    }
}
