use serde::Deserialize;
use serde_json::Value;

/// Movie lists the pipeline can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieList {
    Popular,
    TopRated,
}

impl MovieList {
    pub fn path(&self) -> &'static str {
        match self {
            MovieList::Popular => "movie/popular",
            MovieList::TopRated => "movie/top_rated",
        }
    }
}

impl std::fmt::Display for MovieList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovieList::Popular => f.write_str("popular"),
            MovieList::TopRated => f.write_str("top_rated"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoviePage {
    #[serde(default)]
    pub total_pages: u32,
    /// Kept as raw objects; typing happens in the transformation stage.
    #[serde(default)]
    pub results: Vec<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub budget: Value,
    #[serde(default)]
    pub revenue: Value,
    #[serde(default)]
    pub runtime: Value,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub production_companies: Vec<Company>,
}

impl MovieDetails {
    pub fn company_names(&self) -> Vec<Value> {
        self.production_companies
            .iter()
            .map(|c| c.name.clone().map(Value::String).unwrap_or(Value::Null))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

impl Credits {
    /// Names of crew members whose job is exactly `Director`, in credit order.
    pub fn directors(&self) -> Vec<Value> {
        self.crew
            .iter()
            .filter(|c| c.job.as_deref() == Some("Director"))
            .map(|c| c.name.clone().map(Value::String).unwrap_or(Value::Null))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewMember {
    pub name: Option<String>,
    pub job: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}
