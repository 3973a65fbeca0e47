//! Mapping of driver errors onto a fixed status taxonomy.

use std::fmt;

use crate::error::DriverError;

/// Status codes recorded on spans, following the OpenCensus/gRPC set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    DeadlineExceeded,
    NotFound,
    FailedPrecondition,
    Aborted,
}

impl StatusCode {
    /// The name recorded as `sql.status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
        }
    }

    /// The coarse OpenTelemetry status: anything but `Ok` is an error.
    pub fn otel_code(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            _ => "ERROR",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on a span: a code and, for errors, the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    /// Recorded as `otel.status_description`.
    pub message: Option<String>,
}

impl Status {
    /// Success, without a message.
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    /// A status with `code` and a description.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Map a call outcome to a status. First match wins.
    pub fn from_error(err: Option<&DriverError>) -> Self {
        let Some(err) = err else {
            return Self::ok();
        };
        let code = match err {
            DriverError::Cancelled => StatusCode::Cancelled,
            DriverError::DeadlineExceeded => StatusCode::DeadlineExceeded,
            DriverError::NoRows => StatusCode::NotFound,
            DriverError::TxDone | DriverError::ConnDone => StatusCode::FailedPrecondition,
            _ => StatusCode::Unknown,
        };
        Self::new(code, err.to_string())
    }

    /// [`Status::from_error`] applied to the error side of `result`.
    pub fn from_result<T>(result: &Result<T, DriverError>) -> Self {
        Self::from_error(result.as_ref().err())
    }

    /// Like [`Status::from_result`], but end of iteration counts as success.
    pub fn from_rows_result<T>(result: &Result<T, DriverError>) -> Self {
        match result {
            Err(DriverError::EndOfRows) => Self::ok(),
            other => Self::from_result(other),
        }
    }

    /// Whether the code is [`StatusCode::Ok`].
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_ok() {
        assert_eq!(Status::from_error(None), Status::ok());
    }

    #[test]
    fn test_sentinels() {
        let cases = [
            (DriverError::Cancelled, StatusCode::Cancelled),
            (DriverError::DeadlineExceeded, StatusCode::DeadlineExceeded),
            (DriverError::NoRows, StatusCode::NotFound),
            (DriverError::TxDone, StatusCode::FailedPrecondition),
            (DriverError::ConnDone, StatusCode::FailedPrecondition),
            (DriverError::BadConn, StatusCode::Unknown),
            (DriverError::Skip, StatusCode::Unknown),
        ];
        for (err, code) in cases {
            let status = Status::from_error(Some(&err));
            assert_eq!(status.code, code, "{err:?}");
            assert_eq!(status.message.as_deref(), Some(err.to_string().as_str()));
        }
    }

    #[test]
    fn test_message_text_does_not_matter() {
        let err = DriverError::message("sql: no rows in result set");
        assert_eq!(Status::from_error(Some(&err)).code, StatusCode::Unknown);
    }

    #[test]
    fn test_end_of_rows() {
        let done: Result<(), DriverError> = Err(DriverError::EndOfRows);
        assert!(Status::from_rows_result(&done).is_ok());
        assert_eq!(Status::from_result(&done).code, StatusCode::Unknown);
    }

    #[test]
    fn test_otel_code() {
        assert_eq!(StatusCode::Ok.otel_code(), "OK");
        assert_eq!(StatusCode::Aborted.otel_code(), "ERROR");
    }
}
