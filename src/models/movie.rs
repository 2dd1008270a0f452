use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column order of the raw dataset handed to the transformation stage.
pub const RAW_COLUMNS: [&str; 18] = [
    "id",
    "genre_ids",
    "title",
    "release_date",
    "popularity",
    "vote_average",
    "vote_count",
    "overview",
    "budget",
    "revenue",
    "runtime",
    "original_title",
    "original_language",
    "production_companies",
    "status",
    "directors",
    "poster_path",
    "backdrop_path",
];

/// Raw columns that hold JSON arrays.
pub const LIST_COLUMNS: [&str; 3] = ["genre_ids", "production_companies", "directors"];

/// One movie as assembled from the list endpoint, its details and its credits.
///
/// Fields stay loosely typed JSON: anything the API sends (or fails to send)
/// reaches the cleaning rules untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMovie {
    pub id: Value,
    pub genre_ids: Value,
    pub title: Value,
    pub release_date: Value,
    pub popularity: Value,
    pub vote_average: Value,
    pub vote_count: Value,
    pub overview: Value,
    pub budget: Value,
    pub revenue: Value,
    pub runtime: Value,
    pub original_title: Value,
    pub original_language: Value,
    pub production_companies: Value,
    pub status: Value,
    pub directors: Value,
    pub poster_path: Value,
    pub backdrop_path: Value,
}

impl RawMovie {
    /// Take the list-endpoint fields out of a result item. Details and credits are filled later.
    pub fn from_list_item(item: &serde_json::Map<String, Value>) -> Self {
        let get = |key: &str| item.get(key).cloned().unwrap_or(Value::Null);
        Self {
            id: get("id"),
            genre_ids: get("genre_ids"),
            title: get("title"),
            release_date: get("release_date"),
            popularity: get("popularity"),
            vote_average: get("vote_average"),
            vote_count: get("vote_count"),
            overview: get("overview"),
            original_title: get("original_title"),
            original_language: get("original_language"),
            poster_path: get("poster_path"),
            backdrop_path: get("backdrop_path"),
            ..Default::default()
        }
    }

    /// Cells in [`RAW_COLUMNS`] order.
    pub fn cells(&self) -> [Value; 18] {
        [
            self.id.clone(),
            self.genre_ids.clone(),
            self.title.clone(),
            self.release_date.clone(),
            self.popularity.clone(),
            self.vote_average.clone(),
            self.vote_count.clone(),
            self.overview.clone(),
            self.budget.clone(),
            self.revenue.clone(),
            self.runtime.clone(),
            self.original_title.clone(),
            self.original_language.clone(),
            self.production_companies.clone(),
            self.status.clone(),
            self.directors.clone(),
            self.poster_path.clone(),
            self.backdrop_path.clone(),
        ]
    }
}
