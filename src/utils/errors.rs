#![forbid(unsafe_code)]

use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::{IntoResponse, Response};
use thiserror::Error;

/// Errors enumerates the startup errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("wiki_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    /// Missing or invalid configuration, including required environment variables.
    #[error("Configuration error: {}", .0)]
    ConfigError(String),

    /// The backing store could not be reached at startup.
    #[error("Unable to connect to the article store: {}", .0)]
    ConnectError(String),

    #[error("Unable to load templates: {}", .0)]
    TemplateLoad(String),
}

// ***************************************************************************
//                               Store Errors
// ***************************************************************************
/// Failures reported by the article and blog stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("article {} not found", .0)]
    NotFound(i64),

    #[error("blog file not found: {}", .0)]
    FileNotFound(String),

    /// The requested path resolves outside the store's root directory.
    #[error("path rejected: {}", .0)]
    PathRejected(String),

    #[error(transparent)]
    Backend(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Template lookup or execution failure.
#[derive(Error, Debug)]
#[error("render error: {0}")]
pub struct RenderError(#[from] pub tera::Error);

// ***************************************************************************
//                              Request Errors
// ***************************************************************************
/// Request scoped errors.  Each variant maps to an http status code and never
/// escapes the request that produced it.
#[derive(Error, Debug)]
pub enum WikiError {
    #[error("Not Found: {}", .0)]
    NotFound(String),

    #[error("Bad Request: {}", .0)]
    Validation(String),

    #[error("Method Not Allowed: {}", .0)]
    MethodNotAllowed(String),

    #[error("Store Error: {}", .0)]
    Store(StoreError),

    #[error("Internal Server Error: {}", .0)]
    Render(#[from] RenderError),

    #[error("Service Unavailable: {}", .0)]
    Timeout(String),
}

impl From<StoreError> for WikiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) | StoreError::FileNotFound(_) | StoreError::PathRejected(_) =>
                WikiError::NotFound(e.to_string()),
            _ => WikiError::Store(e),
        }
    }
}

impl ResponseError for WikiError {
    fn status(&self) -> StatusCode {
        match self {
            WikiError::NotFound(_) => StatusCode::NOT_FOUND,
            WikiError::Validation(_) => StatusCode::BAD_REQUEST,
            WikiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            WikiError::Store(_) | WikiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WikiError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Server side failures are logged where they happen; the client only
    /// sees the status line.
    fn as_response(&self) -> Response
    where Self: std::error::Error + Send + Sync + 'static
    {
        let status = self.status();
        let body = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error".to_string(),
            _ => self.to_string(),
        };
        body.with_status(status).into_response()
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let e: WikiError = StoreError::NotFound(7).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: WikiError = StoreError::PathRejected("../x".to_string()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn backend_failure_maps_to_500() {
        let e: WikiError = StoreError::Backend(sqlx::Error::PoolTimedOut).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let e: WikiError = StoreError::Backend(sqlx::Error::Protocol("secret dsn".to_string())).into();
        let resp = e.as_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.into_body().into_string().await.unwrap(), "Internal Server Error");

        let e = WikiError::Render(RenderError(tera::Error::msg("template view.html exploded")));
        let body = e.as_response().into_body().into_string().await.unwrap();
        assert!(!body.contains("view.html"));
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let resp = WikiError::Validation("missing title".to_string()).as_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.into_body().into_string().await.unwrap().contains("missing title"));
    }
}
