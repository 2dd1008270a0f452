use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::Config;
use crate::core::extract::{extract, ExtractSettings};
use crate::core::frame::MovieFrame;
use crate::core::load::{load_sqlite, write_parquet};
use crate::core::tmdb::{MovieCatalog, TmdbClient};
use crate::core::{quality, transform};
use crate::utils::ReelResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Movies returned by the extraction stage.
    pub extracted: usize,
    /// Rows left after cleaning.
    pub kept: usize,
    /// Rows written to SQLite.
    pub loaded: usize,
    pub elapsed: Duration,
}

pub async fn run(config: &Config) -> ReelResult<RunSummary> {
    let client = TmdbClient::from_config(&config.tmdb)?;
    run_with_catalog(&client, config).await
}

/// Extract, clean and load using any catalog implementation.
pub async fn run_with_catalog(catalog: &dyn MovieCatalog, config: &Config) -> ReelResult<RunSummary> {
    let started = Instant::now();
    let settings = ExtractSettings::from(&config.tmdb);
    info!(
        list = %settings.list,
        pages = settings.pages,
        language = %settings.language,
        "Starting extraction"
    );

    let extraction = extract(catalog, &settings).await;
    if extraction.movies.is_empty() {
        warn!("No movies were extracted, nothing to load");
        return Ok(RunSummary { elapsed: started.elapsed(), ..Default::default() });
    }

    let raw = MovieFrame::from_records(&extraction.movies)?;
    if let Some(raw_path) = &config.output.raw_parquet {
        write_parquet(&raw, Path::new(raw_path))?;
    }

    if config.quality.enabled {
        quality::inspect(&raw)?.log();
    }

    let extracted = raw.height();
    let clean = transform::transform(raw, &extraction.genres)?;
    let kept = clean.height();

    write_parquet(&clean, Path::new(&config.output.parquet))?;
    let loaded = load_sqlite(&clean, Path::new(&config.database.path), &config.database.table)?;

    let summary = RunSummary { extracted, kept, loaded, elapsed: started.elapsed() };
    info!(
        extracted = summary.extracted,
        kept = summary.kept,
        loaded = summary.loaded,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Pipeline finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::tests::FakeCatalog;
    use serde_json::json;
    use std::path::PathBuf;

    fn config(dir: &Path, raw: bool) -> Config {
        let path = |name: &str| dir.join(name).display().to_string().replace('\\', "/");
        let raw_line = if raw {
            format!("raw_parquet = \"{}\"", path("raw/movies_raw.parquet"))
        } else {
            String::new()
        };
        let toml = format!(
            r#"
            [tmdb]
            api_key = "k"
            pages = 2
            [tmdb.pacing]
            page_delay_ms = 0
            detail_delay_ms = 0
            [output]
            parquet = "{parquet}"
            {raw_line}
            [database]
            path = "{db}"
            table = "movies"
            "#,
            parquet = path("out/movies.parquet"),
            db = path("db/movies.db"),
        );
        Config::from_toml(&toml).unwrap()
    }

    fn count_rows(db: PathBuf) -> i64 {
        let conn = rusqlite::Connection::open(db).unwrap();
        conn.query_row("SELECT COUNT(*) FROM movies", [], |r| r.get(0)).unwrap()
    }

    #[tokio::test]
    async fn runs_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), true);
        let catalog = FakeCatalog::new(vec![
            Ok(vec![
                json!({"id": 10, "title": "dez", "genre_ids": [28, 18], "release_date": "2001-02-03"}),
                json!({"id": 10, "title": "dez de novo"}),
            ]),
            Ok(vec![json!({"id": 20, "title": "vinte", "genre_ids": [99]})]),
        ]);

        let summary = run_with_catalog(&catalog, &cfg).await.unwrap();
        assert_eq!(summary.extracted, 3);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.loaded, 2);

        assert!(dir.path().join("raw/movies_raw.parquet").exists());
        assert!(dir.path().join("out/movies.parquet").exists());
        assert_eq!(count_rows(dir.path().join("db/movies.db")), 2);

        let conn = rusqlite::Connection::open(dir.path().join("db/movies.db")).unwrap();
        let (title, genres, directors): (String, String, String) = conn
            .query_row("SELECT title, genres, directors FROM movies WHERE id = 10", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(title, "Dez");
        assert_eq!(genres, r#"["Ação","Drama"]"#);
        assert_eq!(directors, r#"["Director One"]"#);
    }

    #[tokio::test]
    async fn rerun_replaces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), false);
        let catalog = FakeCatalog::new(vec![Ok(vec![json!({"id": 1, "title": "um"})])]);

        run_with_catalog(&catalog, &cfg).await.unwrap();
        run_with_catalog(&catalog, &cfg).await.unwrap();
        assert_eq!(count_rows(dir.path().join("db/movies.db")), 1);
        assert!(!dir.path().join("raw").exists());
    }

    #[tokio::test]
    async fn empty_extraction_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), true);
        let catalog = FakeCatalog::new(vec![]);

        let summary = run_with_catalog(&catalog, &cfg).await.unwrap();
        assert_eq!(summary.extracted, 0);
        assert_eq!(summary.loaded, 0);
        assert!(!dir.path().join("db").exists());
        assert!(!dir.path().join("out").exists());
    }
}
