// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Envelope answered by every gateway call.
///
/// A success carries `data` and an empty `errors` list; a failure carries one
/// or more [`ResponseError`]s. Adapters capture all inbound failures into
/// this envelope instead of unwinding across the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub data: Option<T>,
    #[serde(default = "Vec::new")]
    pub errors: Vec<ResponseError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    pub message: String,
}

impl ResponseError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl Display for ResponseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn error<E: Into<ResponseError>>(error: E) -> Self {
        Self {
            data: None,
            errors: vec![error.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.data.is_some()
    }

    /// Unwrap the payload, or surface the first error message.
    pub fn into_result(self) -> Result<T, ResponseError> {
        match (self.data, self.errors.into_iter().next()) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ResponseError::new("empty response")),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            data: self.data.map(f),
            errors: self.errors,
        }
    }
}

impl<T, E: Into<ResponseError>> From<Result<T, E>> for Response<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let response = Response::ok(42);
        assert!(response.is_ok());
        assert_eq!(response.into_result().unwrap(), 42);
    }

    #[test]
    fn test_error_response() {
        let response: Response<i32> = Response::error(ResponseError::with_code(7, "rejected"));
        assert!(!response.is_ok());
        let error = response.into_result().unwrap_err();
        assert_eq!(error.code, Some(7));
        assert_eq!(error.message, "rejected");
    }

    #[test]
    fn test_serde_shape() {
        let response = Response::ok("payload");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"data":"payload","errors":[]}"#);
    }
}
