// AWS SDK plumbing

//! Shared AWS SDK configuration and error classification
//!
//! Both cloud collaborators (EC2 for the instance, CloudWatch for metrics)
//! are built from one [`SdkConfig`]. Service failures are mapped onto the
//! control error taxonomy from their error code.

use crate::error::ControlError;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use std::error::Error;

/// Load credentials and region from the environment.
/// An explicit `region` overrides whatever the environment resolves.
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}

/// Map an SDK failure onto the control error taxonomy.
///
/// Errors without a service error code (dispatch failures, timeouts,
/// credential resolution) are internal.
pub fn classify_sdk_error<E>(err: &E) -> ControlError
where
    E: ProvideErrorMetadata + Error,
{
    match err.code() {
        Some(code) => classify_code(code, err.message().unwrap_or_default()),
        None => ControlError::Internal(DisplayErrorContext(err).to_string()),
    }
}

/// Map a service error code and message onto the control error taxonomy
pub fn classify_code(code: &str, message: &str) -> ControlError {
    match code {
        "UnauthorizedOperation" | "AccessDenied" | "AccessDeniedException" => {
            ControlError::Authorization(message.to_string())
        }
        c if c.starts_with("InvalidInstanceID.") => ControlError::NotFound(message.to_string()),
        _ => ControlError::Provider {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}
