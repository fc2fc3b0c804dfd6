// AWS Lambda binary entry point
//
// Build with: cargo build -p hyperpod-lambda
//
// The lambda_runtime crate drives the handler on tokio, so we use #[tokio::main]

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    hyperpod_lambda::run().await
}
