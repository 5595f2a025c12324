//! Extractors that report failures through [`AppError`]

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` whose rejections (missing content type, malformed body,
/// wrong shape) become 400 responses in the standard error envelope.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::header, http::StatusCode, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    fn app() -> Router {
        Router::new().route(
            "/",
            post(|JsonBody(greeting): JsonBody<Greeting>| async move { greeting.name }),
        )
    }

    async fn send(request: Request) -> StatusCode {
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn accepts_well_formed_json() {
        let request = http::Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"quill"}"#))
            .unwrap();
        assert_eq!(send(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_or_untyped_bodies_are_bad_requests() {
        let malformed = http::Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        assert_eq!(send(malformed).await, StatusCode::BAD_REQUEST);

        let missing_field = http::Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        assert_eq!(send(missing_field).await, StatusCode::BAD_REQUEST);

        let no_content_type = http::Request::post("/").body(Body::empty()).unwrap();
        assert_eq!(send(no_content_type).await, StatusCode::BAD_REQUEST);
    }
}
