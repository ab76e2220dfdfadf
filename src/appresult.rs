use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::delivery::SendError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            (self.0, format!("{}\n\n{}", self.1, self.1.backtrace())).into_response()
        } else {
            (self.0, self.1.to_string()).into_response()
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self(status, err.into())
    }
}

impl From<SendError> for AppError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::InvalidRecipient | SendError::EmptyMessage => {
                Self(StatusCode::UNPROCESSABLE_ENTITY, err.into())
            }
            SendError::Store(err) => err.into(),
        }
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(StatusCode::INTERNAL_SERVER_ERROR, anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(axum::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        let err: AppError = SendError::EmptyMessage.into();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = SendError::InvalidRecipient.into();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn app_errors_are_debuggable() {
        // Handler results get unwrapped in tests, which needs `E: Debug`.
        let err: AppResult<()> = Err(SendError::EmptyMessage.into());
        let rendered = format!("{err:?}");
        assert!(rendered.contains("422"));
    }

    #[test]
    fn store_unavailable_is_503() {
        let err: AppError =
            SendError::Store(StoreError::Unavailable(anyhow::anyhow!("down"))).into();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
