use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_app::modules::generator::{parse_generation, ContentGenerator, GeminiClient};
use quill_db::Database;
use quill_kernel::{settings::Settings, InitCtx, ModuleRegistry};

const DEFAULT_TOPIC: &str = "Create a space exploration blog";

#[derive(Debug, Parser)]
#[command(name = "quill", version, about = "Blog publishing backend with AI drafts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Apply migrations and serve the HTTP API (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Generate a draft for a topic and print it
    Generate {
        /// Topic or requirement for the post
        topic: Option<String>,
        /// Print the provider's raw reply instead of the parsed draft
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load Quill settings")?;
    quill_telemetry::init(&settings.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::Migrate => migrate(&settings).await.map(|_| ()),
        Command::Generate { topic, raw } => generate(settings, topic, raw).await,
    }
}

fn build_registry(db: &Database, settings: &Settings) -> ModuleRegistry {
    let generator: Arc<dyn ContentGenerator> =
        Arc::new(GeminiClient::new(settings.generator.clone()));

    let mut registry = ModuleRegistry::new();
    quill_app::register_all(&mut registry, db, settings, generator);
    registry
}

async fn migrate(settings: &Settings) -> anyhow::Result<(Database, ModuleRegistry)> {
    let db = Database::connect(&settings.database)
        .await
        .context("failed to connect to the database")?;
    let registry = build_registry(&db, settings);

    let applied = db
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");

    Ok((db, registry))
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let (_db, registry) = migrate(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = quill_http::start_server(&registry, &settings).await;

    registry.stop_all().await?;
    served
}

async fn generate(settings: Settings, topic: Option<String>, raw: bool) -> anyhow::Result<()> {
    let topic = topic
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    let client = GeminiClient::new(settings.generator);
    tracing::info!(model = client.model(), %topic, "requesting draft");
    let reply = client.generate(&topic).await.context("generation failed")?;

    if raw {
        println!("{reply}");
    } else {
        let draft = parse_generation(&reply);
        println!("{}", serde_json::to_string_pretty(&draft)?);
    }
    Ok(())
}
