//! Router builder for the Quill HTTP server

use axum::{routing::get, Router};
use std::path::Path;
use std::time::Duration;
use tower::Layer;
use tower_http::{
    cors::{Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use quill_kernel::ModuleRegistry;

use crate::MakeRequestUuid;

const API_TITLE: &str = "Quill API";
const API_VERSION: &str = "1.0.0";

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/{module_name}`. Paths below the
    /// mount point match with or without a trailing slash, so both
    /// `/api/posts` and `/api/posts/` reach the module's `/` route.
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("/api/{}", module_name);
        let module_service = NormalizePathLayer::trim_trailing_slash().layer(module_router);
        self.router = self.router.nest_service(&api_path, module_service);
        self
    }

    /// Serve files below `root` read-only at `url_prefix`
    pub fn with_media(mut self, url_prefix: &str, root: &Path) -> Self {
        self.router = self.router.nest_service(url_prefix, ServeDir::new(root));
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Tag each request with a UUIDv7 `x-request-id` and echo it back.
    /// Must be layered after tracing so the span sees the id.
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Merge every module's OpenAPI fragment and serve it at
    /// `/docs/openapi.json`, with Swagger UI at `/swagger-ui`
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merged_openapi(registry);

        // Round-trip through utoipa so Swagger UI gets a typed document.
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "merged OpenAPI document is invalid, serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title(API_TITLE)
                            .version(API_VERSION)
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Base document plus each module's `paths` (prefixed with the module
/// mount point) and `components.schemas`
pub fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.0.0",
        "info": {
            "title": API_TITLE,
            "version": API_VERSION,
            "description": "Blog publishing API"
        },
        "paths": {},
        "components": {
            "schemas": {},
            "securitySchemes": {
                "tokenAuth": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "Authorization",
                    "description": "`Token <key>` as issued by /api/auth/login"
                }
            }
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "message": { "type": "string" },
                    "details": { "type": "array", "items": {} },
                    "trace_id": { "type": "string" },
                    "timestamp": { "type": "string" }
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["error"]
    });

    openapi_spec["paths"]["/healthz"] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                // "/" maps onto the bare mount point.
                let prefixed_path = match path.as_str() {
                    "/" => format!("/api/{}", module.name()),
                    _ => format!("/api/{}{}", module.name(), path),
                };
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use quill_kernel::Module;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NotesModule;

    #[async_trait::async_trait]
    impl Module for NotesModule {
        fn name(&self) -> &'static str {
            "notes"
        }

        fn routes(&self) -> Router {
            Router::new().route("/", get(|| async { "notes" }))
        }

        fn openapi(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({
                "paths": { "/": { "get": { "summary": "List notes", "responses": {} } } },
                "components": { "schemas": { "Note": { "type": "object" } } }
            }))
        }
    }

    async fn text(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_router_builder_basic() {
        let router = RouterBuilder::new()
            .route("/test", get(|| async { "test" }))
            .build();

        assert_eq!(text(router, "/test").await, (StatusCode::OK, "test".to_string()));
    }

    #[tokio::test]
    async fn test_module_mounting() {
        let module_router = Router::new().route("/", get(|| async { "module" }));

        let router = RouterBuilder::new()
            .mount_module("test", module_router)
            .build();

        let (status, body) = text(router, "/api/test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "module");
    }

    #[tokio::test]
    async fn module_paths_accept_a_trailing_slash() {
        let module_router = Router::new()
            .route("/", get(|| async { "list" }))
            .route(
                "/{id}",
                get(|axum::extract::Path(id): axum::extract::Path<String>| async move { id }),
            );
        let router = RouterBuilder::new()
            .mount_module("notes", module_router)
            .build();

        for (uri, expected) in [
            ("/api/notes", "list"),
            ("/api/notes/", "list"),
            ("/api/notes/7", "7"),
            ("/api/notes/7/", "7"),
        ] {
            assert_eq!(
                text(router.clone(), uri).await,
                (StatusCode::OK, expected.to_string()),
                "{uri}"
            );
        }

        let (status, _) = text(router, "/api/notes/7/extra").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_middleware_chain_sets_request_id() {
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_tracing()
            .with_cors()
            .with_request_id()
            .with_timeout(5000)
            .build();

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
    }

    #[test]
    fn test_openapi_merges_module_fragments() {
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(NotesModule));

        let document = merged_openapi(&registry);

        assert!(document["paths"]["/api/notes"]["get"].is_object());
        assert!(document["paths"]["/healthz"]["get"].is_object());
        assert!(document["components"]["schemas"]["Note"].is_object());
        assert!(document["components"]["schemas"]["ErrorResponse"].is_object());
        assert_eq!(document["components"]["securitySchemes"]["tokenAuth"]["in"], "header");
    }
}
