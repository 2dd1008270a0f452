use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::core::tmdb::{MovieCatalog, MovieList};
use crate::models::movie::RawMovie;
use crate::utils::Error;

/// Everything the extraction stage needs to know, taken from `[tmdb]` config.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub list: MovieList,
    pub pages: u32,
    pub language: String,
    pub page_delay: Duration,
    pub detail_delay: Duration,
}

impl From<&crate::config::TmdbConfig> for ExtractSettings {
    fn from(cfg: &crate::config::TmdbConfig) -> Self {
        Self {
            list: cfg.list,
            pages: cfg.pages,
            language: cfg.language.clone(),
            page_delay: Duration::from_millis(cfg.pacing.page_delay_ms),
            detail_delay: Duration::from_millis(cfg.pacing.detail_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub movies: Vec<RawMovie>,
    pub genres: HashMap<i64, String>,
}

/// Walk list pages `1..=pages`. A page that still fails after the client's
/// retries ends the walk; whatever was collected so far is returned.
pub async fn fetch_movie_list(
    catalog: &dyn MovieCatalog,
    settings: &ExtractSettings,
) -> Vec<serde_json::Map<String, Value>> {
    let mut items = Vec::new();
    for page in 1..=settings.pages {
        if page > 1 && !settings.page_delay.is_zero() {
            tokio::time::sleep(settings.page_delay).await;
        }
        match catalog.movie_page(settings.list, page, &settings.language).await {
            Ok(resp) => {
                info!(
                    target: "reelpipe::extract",
                    list = %settings.list,
                    page,
                    total_pages = resp.total_pages,
                    results = resp.results.len(),
                    "Fetched list page"
                );
                items.extend(resp.results);
                if page >= resp.total_pages {
                    debug!(page, total_pages = resp.total_pages, "Reached last available page");
                    break;
                }
            }
            Err(e) => {
                error!(target: "reelpipe::extract", page, "Failed to fetch list page, stopping: {e}");
                break;
            }
        }
    }
    items
}

pub async fn fetch_genre_map(
    catalog: &dyn MovieCatalog,
    language: &str,
) -> Result<HashMap<i64, String>, Error> {
    let genres = catalog.genres(language).await?;
    Ok(genres.into_iter().map(|g| (g.id, g.name)).collect())
}

/// Fill details and credits fields. Failures are logged and leave the fields null.
pub async fn enrich_movie(catalog: &dyn MovieCatalog, movie: &mut RawMovie, movie_id: i64, language: &str) {
    match catalog.movie_details(movie_id, language).await {
        Ok(details) => {
            movie.production_companies = Value::Array(details.company_names());
            movie.budget = details.budget;
            movie.revenue = details.revenue;
            movie.runtime = details.runtime;
            movie.status = details.status;
        }
        Err(e) => warn!(target: "reelpipe::extract", movie_id, "Failed to fetch details: {e}"),
    }

    match catalog.movie_credits(movie_id, language).await {
        Ok(credits) => movie.directors = Value::Array(credits.directors()),
        Err(e) => warn!(target: "reelpipe::extract", movie_id, "Failed to fetch credits: {e}"),
    }
}

/// List, then enrich every movie one by one. Items without a numeric id cannot
/// be looked up and are skipped. Without a genre map, genre ids are kept as text.
pub async fn extract(catalog: &dyn MovieCatalog, settings: &ExtractSettings) -> Extraction {
    let genres = match fetch_genre_map(catalog, &settings.language).await {
        Ok(genres) => {
            info!(target: "reelpipe::extract", count = genres.len(), "Loaded genre names");
            genres
        }
        Err(e) => {
            warn!(target: "reelpipe::extract", "Failed to fetch genre names, continuing without them: {e}");
            HashMap::new()
        }
    };

    let items = fetch_movie_list(catalog, settings).await;
    info!(target: "reelpipe::extract", count = items.len(), "Collected list items");

    let mut movies = Vec::with_capacity(items.len());
    for item in &items {
        let Some(movie_id) = item.get("id").and_then(Value::as_i64) else {
            warn!(target: "reelpipe::extract", title = ?item.get("title"), "Skipping list item without a numeric id");
            continue;
        };
        if !movies.is_empty() && !settings.detail_delay.is_zero() {
            tokio::time::sleep(settings.detail_delay).await;
        }
        debug!(movie_id, title = ?item.get("title"), "Fetching details and credits");
        let mut movie = RawMovie::from_list_item(item);
        enrich_movie(catalog, &mut movie, movie_id, &settings.language).await;
        movies.push(movie);
    }

    Extraction { movies, genres }
}
