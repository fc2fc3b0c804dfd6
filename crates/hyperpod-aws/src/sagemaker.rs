//! SageMaker cluster API over SigV4-signed JSON requests
//!
//! CreateCluster accepts the same property names as the CloudFormation
//! `AWS::SageMaker::Cluster` resource, so the cluster request body is sent
//! unchanged.

use crate::context::AwsContext;
use crate::error::{classify_aws_error, AwsError};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use hyperpod_core::{ClusterRequest, ClusterService, ClusterSummary, DeleteStatus};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const SIGNING_NAME: &str = "sagemaker";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn sagemaker_endpoint(region: &str) -> String {
    format!("https://api.{}.{}.amazonaws.com/", SIGNING_NAME, region)
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateClusterOutput {
    cluster_arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeClusterOutput {
    cluster_arn: String,
    #[serde(default)]
    cluster_status: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Signs each call with the Lambda execution role's credentials
pub struct SageMakerClusterService {
    client: reqwest::Client,
    credentials_provider: SharedCredentialsProvider,
    region: String,
    endpoint: String,
}

impl SageMakerClusterService {
    pub fn new(
        client: reqwest::Client,
        credentials_provider: SharedCredentialsProvider,
        region: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            client,
            credentials_provider,
            endpoint: sagemaker_endpoint(&region),
            region,
        }
    }

    pub fn from_context(ctx: &AwsContext) -> Result<Self> {
        let region = ctx
            .region()
            .ok_or_else(|| anyhow!("No AWS region configured for SageMaker"))?;
        let credentials_provider = ctx
            .sdk_config()
            .credentials_provider()
            .ok_or_else(|| anyhow!("No AWS credentials provider available"))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::new(client, credentials_provider, region))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: Vec<u8>) -> Result<T> {
        let credentials = self
            .credentials_provider
            .provide_credentials()
            .await
            .map_err(|e| anyhow!("Failed to get AWS credentials: {}", e))?;

        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("x-amz-target".to_string(), format!("SageMaker.{}", operation)),
        ];

        let signable_headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let signable_request = SignableRequest::new(
            "POST",
            self.endpoint.as_str(),
            signable_headers.into_iter(),
            SignableBody::Bytes(&body),
        )
        .map_err(|e| anyhow!("Failed to create signable request: {}", e))?;

        let identity = aws_credential_types::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(String::from),
            None,
            "lambda-execution-role",
        )
        .into();

        let signing_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| anyhow!("Failed to build signing params: {}", e))?
            .into();

        let (signing_instructions, _signature) = sign(signable_request, &signing_params)
            .map_err(|e| anyhow!("Failed to sign request: {}", e))?
            .into_parts();

        for (name, value) in signing_instructions.headers() {
            headers.push((name.to_string(), value.to_string()));
        }

        let mut request_builder = self.client.post(&self.endpoint);
        for (name, value) in &headers {
            request_builder = request_builder.header(name, value);
        }

        debug!(operation, "Calling SageMaker");
        let response = request_builder
            .body(body)
            .send()
            .await
            .with_context(|| format!("SageMaker {} request failed", operation))?;

        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .context("Failed to read SageMaker response")?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), error_type.as_deref(), &bytes).into());
        }

        serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid SageMaker {} response", operation))
    }
}

/// `__type` arrives either bare or namespaced (`com.amazonaws.sagemaker#ResourceNotFound`);
/// the header form may carry a `:<doc url>` suffix.
fn error_code(raw: &str) -> &str {
    let raw = raw.split(':').next().unwrap_or(raw);
    raw.rsplit('#').next().unwrap_or(raw)
}

fn api_error(status: u16, header_type: Option<&str>, body: &[u8]) -> AwsError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let code = parsed
        .error_type
        .as_deref()
        .or(header_type)
        .map(error_code)
        .filter(|c| !c.is_empty());
    let fallback = format!("HTTP {}", status);

    classify_aws_error(code, Some(parsed.message.as_deref().unwrap_or(&fallback)))
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AwsError>()
        .is_some_and(AwsError::is_not_found)
}

#[async_trait]
impl ClusterService for SageMakerClusterService {
    async fn create_cluster(&self, request: &ClusterRequest) -> Result<String> {
        let body = serde_json::to_vec(request.properties())
            .context("Failed to serialize cluster request")?;
        let output: CreateClusterOutput = self.call("CreateCluster", body).await?;

        info!(cluster = %request.name(), arn = %output.cluster_arn, "CreateCluster accepted");
        Ok(output.cluster_arn)
    }

    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterSummary>> {
        let body = serde_json::to_vec(&json!({ "ClusterName": name }))?;

        match self.call::<DescribeClusterOutput>("DescribeCluster", body).await {
            Ok(output) => Ok(Some(ClusterSummary {
                arn: output.cluster_arn,
                status: output.cluster_status.unwrap_or_else(|| "Unknown".to_string()),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_cluster(&self, name: &str) -> Result<DeleteStatus> {
        let body = serde_json::to_vec(&json!({ "ClusterName": name }))?;

        match self.call::<IgnoredAny>("DeleteCluster", body).await {
            Ok(_) => Ok(DeleteStatus::Deleted),
            Err(e) if is_not_found(&e) => Ok(DeleteStatus::NotFound),
            Err(e) => Err(e),
        }
    }
}
