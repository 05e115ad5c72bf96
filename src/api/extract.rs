//! JSON body extraction that fails the same way as every other operation

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use tracing::error;

use crate::service::ServiceError;

/// `Json<T>` whose rejection is the opaque [`ServiceError`]
///
/// The parse error is logged and kept out of the response body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                error!(
                    status = rejection.status().as_u16(),
                    error = %rejection.body_text(),
                    "request body rejected"
                );
                Err(ServiceError::OperationFailed)
            }
        }
    }
}
