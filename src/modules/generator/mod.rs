//! Blog drafts from a topic, via the text-generation provider.

pub mod client;
pub mod parser;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use quill_http::{AppError, JsonBody};
use quill_kernel::{InitCtx, Module};
use serde::Deserialize;
use serde_json::json;

pub use client::{ContentGenerator, GeminiClient, GenerationError};
pub use parser::{parse_generation, GeneratedPost};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub requirement: Option<String>,
}

pub struct GeneratorModule {
    generator: Arc<dyn ContentGenerator>,
    api_key_configured: bool,
}

impl GeneratorModule {
    pub fn new(generator: Arc<dyn ContentGenerator>, api_key_configured: bool) -> Self {
        Self {
            generator,
            api_key_configured,
        }
    }
}

#[async_trait]
impl Module for GeneratorModule {
    fn name(&self) -> &'static str {
        "generate-ai-content"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if !self.api_key_configured {
            tracing::warn!(
                module = self.name(),
                "no generator API key configured; generation requests will fail"
            );
        }
        tracing::info!(
            module = self.name(),
            model = %ctx.settings.generator.model,
            "generator module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(generate))
            .with_state(self.generator.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });

        Some(json!({
            "paths": {
                "/": { "post": {
                    "summary": "Generate a blog draft for a topic",
                    "tags": ["Generator"],
                    "requestBody": { "required": true, "content": { "application/json": {
                        "schema": { "$ref": "#/components/schemas/GenerateRequest" } } } },
                    "responses": {
                        "200": { "description": "Parsed draft", "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/GeneratedPost" } } } },
                        "400": error.clone(),
                        "500": error
                    }
                } }
            },
            "components": {
                "schemas": {
                    "GenerateRequest": {
                        "type": "object",
                        "properties": { "requirement": { "type": "string", "minLength": 1 } },
                        "required": ["requirement"]
                    },
                    "GeneratedPost": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "excerpt": { "type": "string" },
                            "generated_code": { "type": "string", "description": "Full HTML document" }
                        },
                        "required": ["title", "excerpt", "generated_code"]
                    }
                }
            }
        }))
    }
}

async fn generate(
    State(generator): State<Arc<dyn ContentGenerator>>,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> Result<Json<GeneratedPost>, AppError> {
    let requirement = request
        .requirement
        .as_deref()
        .map(str::trim)
        .filter(|requirement| !requirement.is_empty())
        .ok_or_else(|| AppError::bad_request("Requirement is required"))?;

    let raw = generator.generate(requirement).await.map_err(|e| {
        tracing::error!(error = %e, "content generation failed");
        AppError::provider(e.to_string())
    })?;

    let post = parse_generation(&raw);
    tracing::info!(
        title = %post.title,
        html_chars = post.html_body.len(),
        "generated blog draft"
    );
    Ok(Json(post))
}

pub fn create_module(generator: Arc<dyn ContentGenerator>, api_key_configured: bool) -> Arc<dyn Module> {
    Arc::new(GeneratorModule::new(generator, api_key_configured))
}
