use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;

/// If this error was caused by an SDK operation that received an HTTP response, return the
/// status code from that response.  Returns None for errors that never reached the service
/// (dispatch failures, timeouts) and for non-SDK errors.
pub fn err_status_code(err: &anyhow::Error) -> Option<u16> {
    sdk_status::<HeadObjectError>(err)
        .or_else(|| sdk_status::<GetObjectError>(err))
        .or_else(|| sdk_status::<PutObjectError>(err))
        .or_else(|| sdk_status::<DeleteObjectError>(err))
}

/// Whether this error is worth retrying: timeouts, failures to dispatch the request or to
/// parse the response, server errors (5xx), and local I/O errors from a partially-consumed
/// stream.  Service errors with a client status (4xx) and all other errors are permanent.
pub fn err_is_transient(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<std::io::Error>().is_some() {
        return true;
    }
    sdk_transient::<HeadObjectError>(err)
        .or_else(|| sdk_transient::<GetObjectError>(err))
        .or_else(|| sdk_transient::<PutObjectError>(err))
        .or_else(|| sdk_transient::<DeleteObjectError>(err))
        .unwrap_or(false)
}

/// Whether this error reports that the requested object does not exist.  Covers the modeled
/// `NotFound` / `NoSuchKey` errors as well as bare 404 responses from S3-compatible services
/// that omit the error body.
pub fn err_object_not_found(err: &anyhow::Error) -> bool {
    if let Some(sdk_err) = err.downcast_ref::<SdkError<HeadObjectError>>() {
        if sdk_err
            .as_service_error()
            .is_some_and(HeadObjectError::is_not_found)
        {
            return true;
        }
    }
    if let Some(sdk_err) = err.downcast_ref::<SdkError<GetObjectError>>() {
        if sdk_err
            .as_service_error()
            .is_some_and(GetObjectError::is_no_such_key)
        {
            return true;
        }
    }
    err_status_code(err) == Some(404)
}

fn sdk_status<E>(err: &anyhow::Error) -> Option<u16>
where
    E: std::error::Error + Send + Sync + 'static,
{
    err.downcast_ref::<SdkError<E>>()?
        .raw_response()
        .map(|resp| resp.status().as_u16())
}

fn sdk_transient<E>(err: &anyhow::Error) -> Option<bool>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let sdk_err = err.downcast_ref::<SdkError<E>>()?;
    Some(match sdk_err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(_) => sdk_err
            .raw_response()
            .map(|resp| (500..600).contains(&resp.status().as_u16()))
            .unwrap_or(false),
        _ => false,
    })
}
