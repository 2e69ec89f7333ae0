use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use retreat_access_core::AppError;

mod types;

pub use types::ErrorResponse;

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        let payload = Json(ErrorResponse::new(self.0.to_string()));
        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use retreat_access_core::AppError;

    use super::ApiError;

    #[test]
    fn policy_violations_map_to_unprocessable_entity() {
        let response =
            ApiError::from(AppError::PolicyViolation("duration too long".to_owned())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn forbidden_and_unauthorized_stay_distinct() {
        assert_eq!(
            ApiError::from(AppError::Forbidden("not a manager".to_owned())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AppError::Unauthorized("missing identity".to_owned())).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
