// Platform detection based on environment variables
//
// - AWS Lambda: AWS_LAMBDA_FUNCTION_NAME env var present
// - Local: anything else (operator CLI)

use crate::env_overrides::EnvSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Lambda,
    Local,
}

impl Platform {
    /// Auto-detect the current platform from the given environment
    pub fn detect<E: EnvSource>(env: &E) -> Self {
        if env.get("AWS_LAMBDA_FUNCTION_NAME").is_some() {
            Platform::Lambda
        } else {
            Platform::Local
        }
    }

    /// CloudWatch renders escape codes literally and stamps every line itself
    pub fn wants_ansi(&self) -> bool {
        matches!(self, Platform::Local)
    }

    pub fn wants_timestamps(&self) -> bool {
        matches!(self, Platform::Local)
    }
}
