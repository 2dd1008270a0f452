mod types;

pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RetryConfig, TmdbConfig};
use crate::utils::Error;

/// What the extraction stage needs from the movie catalog.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn movie_page(&self, list: MovieList, page: u32, language: &str) -> Result<MoviePage, Error>;

    async fn movie_details(&self, movie_id: i64, language: &str) -> Result<MovieDetails, Error>;

    async fn movie_credits(&self, movie_id: i64, language: &str) -> Result<Credits, Error>;

    async fn genres(&self, language: &str) -> Result<Vec<Genre>, Error>;
}

#[derive(Debug, Clone)]
enum Auth {
    /// v3 key, passed as `api_key` query parameter
    ApiKey(String),
    /// v4 read access token
    Bearer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Delay to wait after a failed attempt. A server-provided `Retry-After` wins
    /// over the computed backoff but is still capped.
    fn delay_for(&self, attempt: u32, err: &Error) -> Duration {
        match err {
            Error::RateLimited { retry_after: Some(d), .. } => (*d).min(self.max_backoff),
            _ => self.backoff(attempt),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    base_url: String,
    auth: Auth,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn from_config(cfg: &TmdbConfig) -> Result<Self, Error> {
        let auth = match (&cfg.read_token, &cfg.api_key) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(key)) => Auth::ApiKey(key.clone()),
            (None, None) => {
                return Err(Error::Other(
                    "TMDB credentials missing: set tmdb.api_key or tmdb.read_token".to_string(),
                ))
            }
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth,
            retry: RetryPolicy::from(&cfg.retry),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.api_url(path);
        let mut attempt: u32 = 0;
        loop {
            match self.send_once::<T>(&url, query).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt, &e);
                    warn!(
                        target: "reelpipe::tmdb",
                        path = %path,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "TMDB request failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Error::RateLimited { retry_after, .. }) => {
                    return Err(Error::RateLimited { attempts: attempt + 1, retry_after })
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/json");

        req = match &self.auth {
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::ApiKey(key) => req.query(&[("api_key", key.as_str())]),
        };
        if !query.is_empty() {
            req = req.query(query);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!(target: "reelpipe::tmdb", url = %url, status = %status, "TMDB response");

        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(Error::RateLimited { attempts: 1, retry_after });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { status: status.as_u16(), body });
        }

        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn movie_page(&self, list: MovieList, page: u32, language: &str) -> Result<MoviePage, Error> {
        self.get_json(
            list.path(),
            &[("page", page.to_string()), ("language", language.to_string())],
        )
        .await
    }

    async fn movie_details(&self, movie_id: i64, language: &str) -> Result<MovieDetails, Error> {
        self.get_json(
            &format!("movie/{movie_id}"),
            &[("language", language.to_string())],
        )
        .await
    }

    async fn movie_credits(&self, movie_id: i64, language: &str) -> Result<Credits, Error> {
        self.get_json(
            &format!("movie/{movie_id}/credits"),
            &[("language", language.to_string())],
        )
        .await
    }

    async fn genres(&self, language: &str) -> Result<Vec<Genre>, Error> {
        let list: GenreList = self
            .get_json("genre/movie/list", &[("language", language.to_string())])
            .await?;
        Ok(list.genres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacingConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
    }

    /// Serves the canned responses in order, one connection each, and records the raw requests.
    async fn stub_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_task = seen.clone();
        tokio::spawn(async move {
            for resp in responses {
                let Ok((mut sock, _)) = listener.accept().await else { return };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                seen_task.lock().unwrap().push(String::from_utf8_lossy(&buf).to_string());
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (format!("http://{addr}"), seen)
    }

    fn test_config(base_url: String, max_retries: u32) -> TmdbConfig {
        TmdbConfig {
            base_url,
            api_key: Some("secret".to_string()),
            read_token: None,
            language: "pt-BR".to_string(),
            list: MovieList::Popular,
            pages: 1,
            timeout_secs: 5,
            retry: RetryConfig { max_retries, initial_backoff_ms: 1, max_backoff_ms: 5 },
            pacing: PacingConfig { page_delay_ms: 0, detail_delay_ms: 0 },
        }
    }

    const GENRES: &str = r#"{"genres":[{"id":28,"name":"Ação"},{"id":18,"name":"Drama"}]}"#;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn retry_after_header_wins_but_is_capped() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        };
        let short = Error::RateLimited { attempts: 1, retry_after: Some(Duration::from_secs(2)) };
        let long = Error::RateLimited { attempts: 1, retry_after: Some(Duration::from_secs(90)) };
        let bare = Error::RateLimited { attempts: 1, retry_after: None };
        assert_eq!(policy.delay_for(1, &short), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, &long), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2, &bare), Duration::from_millis(200));
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let mut cfg = test_config("http://localhost".to_string(), 0);
        cfg.api_key = None;
        assert!(TmdbClient::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn retries_after_rate_limit() {
        let (url, seen) = stub_server(vec![
            response("429 Too Many Requests", "Retry-After: 0\r\n", "{}"),
            response("503 Service Unavailable", "", "{}"),
            response("200 OK", "", GENRES),
        ])
        .await;
        let client = TmdbClient::from_config(&test_config(url, 3)).unwrap();

        let genres = client.genres("pt-BR").await.unwrap();
        assert_eq!(genres.len(), 2);
        assert_eq!(genres[0], Genre { id: 28, name: "Ação".to_string() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].starts_with("GET /genre/movie/list?"));
        assert!(seen[0].contains("api_key=secret"));
        assert!(seen[0].contains("language=pt-BR"));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let rate_limited = response("429 Too Many Requests", "", "{}");
        let (url, seen) = stub_server(vec![rate_limited; 3]).await;
        let client = TmdbClient::from_config(&test_config(url, 2)).unwrap();

        let err = client.genres("en-US").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { attempts: 3, retry_after: None }), "{err:?}");
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, seen) = stub_server(vec![
            response("401 Unauthorized", "", r#"{"status_message":"Invalid API key"}"#),
            response("200 OK", "", GENRES),
        ])
        .await;
        let client = TmdbClient::from_config(&test_config(url, 3)).unwrap();

        let err = client.movie_details(550, "pt-BR").await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_token_is_sent_as_bearer() {
        let page = r#"{"page":2,"total_pages":9,"total_results":180,"results":[{"id":1,"title":"A"}]}"#;
        let (url, seen) = stub_server(vec![response("200 OK", "", page)]).await;
        let mut cfg = test_config(url, 0);
        cfg.read_token = Some("tok".to_string());
        let client = TmdbClient::from_config(&cfg).unwrap();

        let page = client.movie_page(MovieList::TopRated, 2, "pt-BR").await.unwrap();
        assert_eq!(page.total_pages, 9);
        assert_eq!(page.results.len(), 1);

        let seen = seen.lock().unwrap();
        let req = seen[0].to_ascii_lowercase();
        assert!(req.starts_with("get /movie/top_rated?"));
        assert!(req.contains("page=2"));
        assert!(req.contains("authorization: bearer tok"));
        assert!(!req.contains("api_key="));
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_returned() {
        // bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = TmdbClient::from_config(&test_config(format!("http://127.0.0.1:{port}"), 2)).unwrap();
        let err = client.genres("pt-BR").await.unwrap_err();
        assert!(matches!(err, Error::HttpRequestError(ref e) if e.is_connect()), "{err:?}");
    }

    #[tokio::test]
    async fn dropped_connections_use_every_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let client = TmdbClient::from_config(&test_config(url, 2)).unwrap();
        let err = client.movie_details(550, "pt-BR").await.unwrap_err();
        assert!(matches!(err, Error::HttpRequestError(_)), "{err:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }
}
