mod app;
mod config;
mod core;
mod models;
mod utils;

#[dotenvy::load(path = "./.env", required = false)]
#[tokio::main]
async fn main() {
    let config = match config::Config::init() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to initialize configuration: {e}");
            std::process::exit(2);
        }
    };
    app::common::init_logging(&config);

    match app::pipeline::run(&config).await {
        Ok(summary) => tracing::info!(
            "Done: {} extracted, {} kept, {} loaded into '{}'",
            summary.extracted,
            summary.kept,
            summary.loaded,
            config.database.table
        ),
        Err(e) => {
            tracing::error!("Pipeline failed: {e}");
            std::process::exit(1);
        }
    }
}
