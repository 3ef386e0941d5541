//! AWS error classification
//!
//! Maps the error codes returned by DataSync, IAM, STS and the tagging API
//! onto [`MoverError`] using `.code()` from `ProvideErrorMetadata` instead of
//! string matching on Debug output.

use aws_sdk_datasync::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use datamover_common::MoverError;

const FORBIDDEN_CODES: &[&str] = &[
    "Forbidden",
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
];

const LIMIT_CODES: &[&str] = &[
    "LimitExceeded",
    "LimitExceededException",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

const NOT_FOUND_CODES: &[&str] = &["NotFound", "NoSuchEntity", "ResourceNotFoundException"];

const BAD_REQUEST_CODES: &[&str] = &[
    "InvalidRequestException",
    "InvalidParameterException",
    "InvalidInput",
    "MalformedPolicyDocument",
    "ValidationError",
];

const CONFLICT_CODES: &[&str] = &["EntityAlreadyExists", "DeleteConflict"];

const INTERNAL_CODES: &[&str] = &["InternalException", "InternalServiceError"];

const UNAVAILABLE_CODES: &[&str] = &["ServiceUnavailable", "ServiceFailure"];

/// Classify an error code reported by a dependent service.
///
/// Any code the service sent that is not listed is a client-side condition
/// and maps to `BadRequest`.
pub fn classify_service_code(code: &str, message: Option<&str>, context: &str) -> MoverError {
    let msg = match message {
        Some(m) if !m.is_empty() => format!("{context}: {code}: {m}"),
        _ => format!("{context}: {code}"),
    };

    match code {
        c if FORBIDDEN_CODES.contains(&c) => MoverError::Forbidden(msg),
        c if LIMIT_CODES.contains(&c) => MoverError::LimitExceeded(msg),
        c if NOT_FOUND_CODES.contains(&c) => MoverError::NotFound(msg),
        c if BAD_REQUEST_CODES.contains(&c) => MoverError::BadRequest(msg),
        c if CONFLICT_CODES.contains(&c) => MoverError::Conflict(msg),
        c if INTERNAL_CODES.contains(&c) => MoverError::Internal(msg),
        c if UNAVAILABLE_CODES.contains(&c) => MoverError::ServiceUnavailable(msg),
        _ => MoverError::BadRequest(msg),
    }
}

/// Classify an SDK error.
///
/// Errors without a service response (dispatch failures, timeouts, request
/// construction) are internal.
pub fn classify_sdk_error<E, R>(err: &SdkError<E, R>, context: &str) -> MoverError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let meta = ProvideErrorMetadata::meta(err);
    match (err.as_service_error(), meta.code()) {
        (Some(_), Some(code)) => classify_service_code(code, meta.message(), context),
        _ => MoverError::internal(format!("{context}: {}", DisplayErrorContext(err))),
    }
}

/// Extension for mapping SDK results into [`MoverError`] with context.
pub trait SdkResultExt<T> {
    fn classify(self, context: impl FnOnce() -> String) -> Result<T, MoverError>;
}

impl<T, E, R> SdkResultExt<T> for Result<T, SdkError<E, R>>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn classify(self, context: impl FnOnce() -> String) -> Result<T, MoverError> {
        self.map_err(|e| classify_sdk_error(&e, &context()))
    }
}
