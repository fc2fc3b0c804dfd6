// Custom resource request handling
//
// Create and Update both (re)build the cluster template, or call SageMaker
// when the direct creation mode is configured. In template mode Delete only
// removes the generated artifacts and always reports success so stack
// deletion is never blocked by cleanup; in direct mode a cluster that
// cannot be deleted fails the request.

use crate::response::{CustomResourceResponse, ResponseStatus};
use aws_lambda_events::cloudformation::CloudFormationCustomResourceRequest;
use hyperpod_config::ProvisionerConfig;
use hyperpod_core::{ArtifactStore, ClusterService, Provisioner, SubnetDirectory};
use serde_json::{json, Map, Value};
use tracing::{error, info};

/// Identity fields echoed back in every response
struct RequestIdentity<'a> {
    kind: &'static str,
    request_id: &'a str,
    response_url: &'a str,
    stack_id: &'a str,
    logical_resource_id: &'a str,
    physical_resource_id: Option<&'a str>,
}

fn identity(request: &CloudFormationCustomResourceRequest) -> RequestIdentity<'_> {
    match request {
        CloudFormationCustomResourceRequest::Create(r) => RequestIdentity {
            kind: "Create",
            request_id: &r.request_id,
            response_url: &r.response_url,
            stack_id: &r.stack_id,
            logical_resource_id: &r.logical_resource_id,
            physical_resource_id: None,
        },
        CloudFormationCustomResourceRequest::Update(r) => RequestIdentity {
            kind: "Update",
            request_id: &r.request_id,
            response_url: &r.response_url,
            stack_id: &r.stack_id,
            logical_resource_id: &r.logical_resource_id,
            physical_resource_id: Some(r.physical_resource_id.as_str()),
        },
        CloudFormationCustomResourceRequest::Delete(r) => RequestIdentity {
            kind: "Delete",
            request_id: &r.request_id,
            response_url: &r.response_url,
            stack_id: &r.stack_id,
            logical_resource_id: &r.logical_resource_id,
            physical_resource_id: Some(r.physical_resource_id.as_str()),
        },
    }
}

/// URL the response for `request` must be PUT to
pub fn response_url(request: &CloudFormationCustomResourceRequest) -> &str {
    identity(request).response_url
}

/// Run the request and build the response CloudFormation expects.
///
/// `config` carries the configuration load error, if any, so that it can be
/// reported to the stack instead of failing the invocation.
pub async fn handle_request<D, S, C>(
    request: &CloudFormationCustomResourceRequest,
    log_stream: &str,
    config: Result<&ProvisionerConfig, &str>,
    subnets: &D,
    store: &S,
    clusters: &C,
) -> CustomResourceResponse
where
    D: SubnetDirectory + ?Sized,
    S: ArtifactStore + ?Sized,
    C: ClusterService + ?Sized,
{
    let id = identity(request);
    info!(
        request_type = id.kind,
        request_id = %id.request_id,
        logical_resource_id = %id.logical_resource_id,
        "Received custom resource request"
    );

    let outcome = match (request, config) {
        (CloudFormationCustomResourceRequest::Delete(_), Ok(config)) => {
            Provisioner::new(config, subnets, store, clusters)
                .delete()
                .await
                .map(|outcome| outcome.response_data())
                .map_err(|e| e.to_string())
        }
        (CloudFormationCustomResourceRequest::Delete(_), Err(e)) => {
            error!(error = %e, "Configuration unavailable; skipping cleanup");
            let mut data = Map::new();
            data.insert(
                "Message".into(),
                json!(format!("Configuration unavailable, nothing deleted: {}", e)),
            );
            Ok(data)
        }
        (_, Ok(config)) => Provisioner::new(config, subnets, store, clusters)
            .create()
            .await
            .map(|outcome| outcome.response_data())
            .map_err(|e| e.to_string()),
        (_, Err(e)) => Err(format!("Failed to load configuration: {}", e)),
    };

    let physical_resource_id = id.physical_resource_id.unwrap_or(log_stream).to_string();
    let (status, reason, data) = match outcome {
        Ok(data) => (
            ResponseStatus::Success,
            format!("See the details in CloudWatch Log Stream: {}", log_stream),
            data,
        ),
        Err(reason) => {
            error!(request_type = id.kind, error = %reason, "Custom resource request failed");
            let mut data = Map::new();
            data.insert("Reason".into(), Value::String(reason.clone()));
            (ResponseStatus::Failed, reason, data)
        }
    };

    CustomResourceResponse {
        status,
        reason,
        physical_resource_id,
        stack_id: id.stack_id.to_string(),
        request_id: id.request_id.to_string(),
        logical_resource_id: id.logical_resource_id.to_string(),
        no_echo: false,
        data,
    }
}
