// CloudFormation custom resource responses
//
// Every request must be answered with a PUT to its pre-signed ResponseURL,
// otherwise the stack waits for the resource until it times out.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body of the PUT to the request's ResponseURL
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

/// Delivers a response to CloudFormation
#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, response_url: &str, response: &CustomResourceResponse) -> Result<()>;
}

/// Sends responses over HTTPS with reqwest
#[derive(Debug, Clone, Default)]
pub struct HttpResponseSender {
    client: reqwest::Client,
}

impl HttpResponseSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(&self, response_url: &str, response: &CustomResourceResponse) -> Result<()> {
        let body = serde_json::to_string(response).context("Failed to encode response")?;

        // The pre-signed URL is signed without a content type
        let reply = self
            .client
            .put(response_url)
            .header(reqwest::header::CONTENT_TYPE, "")
            .body(body)
            .send()
            .await
            .context("Failed to send response to CloudFormation")?;

        let status = reply.status();
        if !status.is_success() {
            bail!("CloudFormation rejected the response with HTTP {}", status);
        }

        info!(status = ?response.status, http_status = %status, "Sent response to CloudFormation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_format() {
        let mut data = Map::new();
        data.insert("ClusterName".into(), json!("ml-cluster"));

        let response = CustomResourceResponse {
            status: ResponseStatus::Success,
            reason: "See the details in CloudWatch Log Stream: stream".to_string(),
            physical_resource_id: "stream".to_string(),
            stack_id: "arn:aws:cloudformation:us-west-2:123456789012:stack/ml/1".to_string(),
            request_id: "req-1".to_string(),
            logical_resource_id: "HyperPodCluster".to_string(),
            no_echo: false,
            data,
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "Status": "SUCCESS",
                "Reason": "See the details in CloudWatch Log Stream: stream",
                "PhysicalResourceId": "stream",
                "StackId": "arn:aws:cloudformation:us-west-2:123456789012:stack/ml/1",
                "RequestId": "req-1",
                "LogicalResourceId": "HyperPodCluster",
                "NoEcho": false,
                "Data": {"ClusterName": "ml-cluster"},
            })
        );
    }
}
