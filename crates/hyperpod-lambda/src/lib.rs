// AWS Lambda runtime adapter
//
// Handles CloudFormation custom resource events: builds the HyperPod cluster
// template and stores it in S3 (or creates the cluster through SageMaker in
// direct mode), then reports back to the stack.
//
// lambda_runtime provides the tokio runtime; clients are created once per
// execution environment and shared by every invocation.

use aws_lambda_events::cloudformation::CloudFormationCustomResourceRequest;
use hyperpod_aws::{AwsContext, Ec2SubnetDirectory, S3ArtifactStore, SageMakerClusterService};
use hyperpod_config::{LogFormat, LoggingConfig, Platform, ProvisionerConfig, StdEnvSource};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;

mod handler;
mod response;

pub use handler::{handle_request, response_url};
pub use response::{CustomResourceResponse, HttpResponseSender, ResponseSender, ResponseStatus};

struct LambdaState {
    /// Load failures are kept so each request can report them to its stack
    config: Result<ProvisionerConfig, String>,
    subnets: Ec2SubnetDirectory,
    store: S3ArtifactStore,
    clusters: SageMakerClusterService,
    sender: HttpResponseSender,
}

async fn handle_event(
    event: LambdaEvent<CloudFormationCustomResourceRequest>,
    state: Arc<LambdaState>,
) -> Result<(), Error> {
    let (request, context) = event.into_parts();
    let log_stream = context.env_config.log_stream.clone();

    let config = state.config.as_ref().map_err(String::as_str);
    let response = handle_request(
        &request,
        &log_stream,
        config,
        &state.subnets,
        &state.store,
        &state.clusters,
    )
    .await;

    state
        .sender
        .send(response_url(&request), &response)
        .await
        .map_err(|e| Error::from(format!("{:#}", e)))
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = ProvisionerConfig::load().map_err(|e| format!("{:#}", e));

    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging, Platform::detect(&StdEnvSource));

    if let Err(e) = &config {
        tracing::error!(error = %e, "Failed to load configuration");
    }

    let aws = AwsContext::load(None).await;
    info!(region = ?aws.region(), "Lambda runtime ready");

    let clusters = SageMakerClusterService::from_context(&aws)
        .map_err(|e| Error::from(format!("{:#}", e)))?;

    let state = Arc::new(LambdaState {
        config,
        subnets: Ec2SubnetDirectory::from_context(&aws),
        store: S3ArtifactStore::from_context(&aws),
        clusters,
        sender: HttpResponseSender::default(),
    });

    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<CloudFormationCustomResourceRequest>| {
            let state = state.clone();
            async move { handle_event(event, state).await }
        },
    ))
    .await
}

/// Initialize tracing; CloudWatch adds its own timestamps
fn init_tracing(logging: &LoggingConfig, platform: Platform) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    let ansi = platform.wants_ansi();

    match (logging.format, platform.wants_timestamps()) {
        (LogFormat::Json, true) => registry.with(fmt::layer().json()).init(),
        (LogFormat::Json, false) => registry.with(fmt::layer().json().without_time()).init(),
        (LogFormat::Text, true) => registry.with(fmt::layer().with_ansi(ansi)).init(),
        (LogFormat::Text, false) => registry
            .with(fmt::layer().with_ansi(ansi).without_time())
            .init(),
    }
}
