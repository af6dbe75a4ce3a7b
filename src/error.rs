use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("catalog request failed: {0}")]
    Network(#[from] wreq::Error),

    #[error("malformed {endpoint} response: {source}")]
    Malformed {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn malformed(endpoint: &'static str, source: serde_json::Error) -> Self {
        Self::Malformed { endpoint, source }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Network(_) | AppError::Malformed { .. } => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_names_endpoint() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AppError::malformed("discover", source);
        assert!(err.to_string().starts_with("malformed discover response"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = AppError::NotFound("movie 7".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
