use anyhow::Context;
use jemallocator::Jemalloc;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use tally::{export, pipeline, PostgresClient, Settings};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    // Optional config file name, defaults to ./config.{yaml,toml,json}
    let config_name = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());

    let settings = Settings::from_file(&config_name).with_context(|| {
        format!(
            "Failed to load {}. Please ensure it exists and is valid",
            config_name
        )
    })?;

    let level = settings.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to initialize logger")?;

    let events = export::load_events(&settings.io.events_path)?;

    let output = pipeline::run(&settings.aggregation, &settings.statements, &events)
        .context("Aggregation run failed")?;

    let csv_path = settings.rows_csv_path();
    export::write_rows_csv(&csv_path, &output.rows)?;
    export::write_statements(
        &settings.io.sql_dir,
        &settings.io.sql_file_prefix,
        &output.statements,
    )?;

    match settings.postgres.clone() {
        Some(postgres) if postgres.apply => {
            let client = PostgresClient::new(postgres)
                .await
                .context("Failed to initialize database connection")?;
            client.execute_statements(&output.statements).await?;
        },
        Some(_) => {
            warn!("PostgreSQL configured but apply is disabled, statements written to disk only");
        },
        None => {},
    }

    info!(
        "Done: {} rows, {} statements",
        output.rows.len(),
        output.statements.len()
    );
    Ok(())
}
