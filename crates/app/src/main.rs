use clients::{InterClient, NotionClient};

use crate::{error::Result, settings::Settings};

mod error;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "inter_sync={level},engine={level},clients={level}",
            level = settings.app.level
        ))
        .init();

    if let Err(err) = run(settings).await {
        tracing::error!("sync failed: {err}");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let bank = InterClient::builder()
        .base_url(&settings.bank.base_url)
        .credentials(&settings.bank.client_id, &settings.bank.client_secret)
        .scope(&settings.bank.scope)
        .certificate(&settings.bank.cert_path, &settings.bank.key_path)
        .build()?;

    let notion = NotionClient::builder()
        .base_url(&settings.notion.base_url)
        .token(&settings.notion.token)
        .version(&settings.notion.version)
        .build()?;

    let entities = settings.entity_table();
    for (tag, reference) in entities.iter() {
        if !reference.is_resolvable() {
            tracing::warn!(%tag, "entity database not configured, relations will be skipped");
        }
    }

    let mut engine = engine::Engine::builder()
        .bank(bank)
        .destination(notion)
        .database_id(&settings.notion.database_id)
        .entities(entities)
        .floor_date(settings.sync.floor_date)
        .window_days(settings.sync.window_days)
        .build()?;

    let report = engine.run(settings.sync.since).await?;
    tracing::info!(
        start = %report.window.start,
        end = %report.window.end,
        fetched = report.fetched,
        existing = report.existing,
        created = report.created,
        "{} new transactions added",
        report.created
    );
    Ok(())
}
