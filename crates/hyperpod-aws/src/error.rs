//! AWS error classification
//!
//! Errors are classified by the service error code from
//! `ProvideErrorMetadata` rather than by matching on their Debug output.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    /// The object or resource does not exist
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Rate limit exceeded")]
    Throttled,

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("AWS error{}: {message}", .code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }
}

/// Codes S3, EC2 and SageMaker use for missing resources. S3 reports a bare `404` for
/// requests without a response body.
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchKey",
    "NoSuchBucket",
    "NotFound",
    "404",
    "InvalidSubnetID.NotFound",
    "ResourceNotFound",
];

const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "UnauthorizedOperation"];

/// Classify an AWS SDK error from its code and message
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify any SDK error that carries service metadata
pub fn classify_sdk_error<E>(error: &E) -> AwsError
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::fmt::Display,
{
    let fallback = error.to_string();
    classify_aws_error(error.code(), error.message().or(Some(fallback.as_str())))
}
