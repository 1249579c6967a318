use async_trait::async_trait;
use lyricfloat_core::{
    CoreError, FetchedLyrics, LrcMetadata, LyricDocument, LyricsProvider, LyricsQuery,
    LyricsResult,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Duration tolerance for matching search results (±2 seconds)
const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Score penalty for a result that only has plain lyrics
const UNSYNCED_PENALTY: i32 = 100;

/// Calculate a score for duration matching (lower is better).
/// Returns 0 for exact matches, higher values for larger differences.
/// Capped at `i32::MAX` to prevent overflow.
fn duration_score(actual: Option<f64>, expected: Option<u32>, scale: f64) -> i32 {
    match (actual, expected) {
        (Some(d), Some(q)) => {
            let diff = (d - f64::from(q)).abs() * scale;
            #[allow(clippy::cast_possible_truncation)]
            if diff.is_nan() || diff > f64::from(i32::MAX) {
                i32::MAX
            } else {
                diff as i32
            }
        }
        _ => 50, // Default score when duration is unknown
    }
}

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: ClientWithMiddleware,
}

impl LrclibProvider {
    /// Create a new LRCLIB provider with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!(
                "lyricfloat/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/kvnxiao/lyricfloat)"
            ))
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }
}

/// Response from LRCLIB API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibResponse {
    id: u64,
    track_name: Option<String>,
    artist_name: Option<String>,
    album_name: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    instrumental: bool,
    plain_lyrics: Option<String>,
    synced_lyrics: Option<String>,
}

impl LrclibResponse {
    fn has_synced(&self) -> bool {
        self.synced_lyrics
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    fn has_plain(&self) -> bool {
        self.plain_lyrics
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    fn within_tolerance(&self, expected_secs: u32) -> bool {
        self.duration
            .is_some_and(|d| (d - f64::from(expected_secs)).abs() <= DURATION_TOLERANCE_SECS)
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        info!(
            "Fetching lyrics from LRCLIB for: {} - {} (duration: {:?}s)",
            query.artist, query.title, query.duration_secs
        );

        let url = get_url(query);
        debug!("LRCLIB GET (exact match): {}", url);

        let response = self.client.get(&url).send().await?;
        debug!("LRCLIB response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!("LRCLIB exact match not found, trying search by track name");
            return self.search_by_title(query).await;
        }

        if !response.status().is_success() {
            warn!("LRCLIB returned status: {}", response.status());
            return Err(self.failed(format!("LRCLIB returned status: {}", response.status())));
        }

        let result: LrclibResponse = response.json().await?;
        info!("LRCLIB found exact match with id: {}", result.id);
        Ok(parse_response(result))
    }
}

impl LrclibProvider {
    /// Search by title only, keeping results within the duration tolerance
    async fn search_by_title(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        let url = format!(
            "{}/search?track_name={}",
            LRCLIB_API_URL,
            urlencoding::encode(&query.title)
        );
        let Some(results) = self.search(&url).await? else {
            return self.search_fallback(query).await;
        };

        let candidates: Vec<_> = match query.duration_secs {
            Some(expected) => results
                .into_iter()
                .filter(|r| r.within_tolerance(expected))
                .collect(),
            None => results,
        };

        match pick_best(candidates, query.duration_secs, 10.0) {
            Some(result) => {
                info!(
                    "LRCLIB found match by track name (id: {}, artist: {:?}, duration: {:?})",
                    result.id, result.artist_name, result.duration
                );
                Ok(parse_response(result))
            }
            None => {
                info!("LRCLIB search by track name had no usable match, trying full search");
                self.search_fallback(query).await
            }
        }
    }

    /// Free-text search on artist and title
    async fn search_fallback(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        let search_query = format!("{} {}", query.artist, query.title);
        let url = format!(
            "{}/search?q={}",
            LRCLIB_API_URL,
            urlencoding::encode(&search_query)
        );

        let Some(results) = self.search(&url).await? else {
            return Err(self.failed("LRCLIB search failed".to_string()));
        };

        match pick_best(results, query.duration_secs, 1.0) {
            Some(result) => {
                info!(
                    "LRCLIB found match via full search (id: {}, artist: {:?})",
                    result.id, result.artist_name
                );
                Ok(parse_response(result))
            }
            None => {
                info!("LRCLIB has no lyrics for {} - {}", query.artist, query.title);
                Ok(FetchedLyrics {
                    result: LyricsResult::NotFound,
                    provider_id: String::new(),
                })
            }
        }
    }

    /// Run a search request. `None` means the endpoint answered with an error status.
    async fn search(&self, url: &str) -> Result<Option<Vec<LrclibResponse>>, CoreError> {
        debug!("LRCLIB GET (search): {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            warn!("LRCLIB search returned status: {}", response.status());
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    fn failed(&self, reason: String) -> CoreError {
        CoreError::LyricsProviderFailed {
            provider: self.name().to_string(),
            reason,
        }
    }
}

/// URL of the exact-match endpoint
fn get_url(query: &LyricsQuery) -> String {
    let mut url = format!(
        "{}/get?artist_name={}&track_name={}",
        LRCLIB_API_URL,
        urlencoding::encode(&query.artist),
        urlencoding::encode(&query.title)
    );
    if let Some(album) = &query.album {
        let _ = write!(url, "&album_name={}", urlencoding::encode(album));
    }
    if let Some(duration) = query.duration_secs {
        let _ = write!(url, "&duration={duration}");
    }
    url
}

/// Prefer synced lyrics, then the closest duration
fn pick_best(
    results: Vec<LrclibResponse>,
    expected_secs: Option<u32>,
    duration_scale: f64,
) -> Option<LrclibResponse> {
    results
        .into_iter()
        .filter(|r| !r.instrumental && (r.has_synced() || r.has_plain()))
        .min_by_key(|r| {
            let sync_score = if r.has_synced() { 0 } else { UNSYNCED_PENALTY };
            sync_score.saturating_add(duration_score(r.duration, expected_secs, duration_scale))
        })
}

fn parse_response(result: LrclibResponse) -> FetchedLyrics {
    let provider_id = result.id.to_string();

    if result.instrumental {
        debug!("Track is instrumental (lrclib id: {})", result.id);
        return FetchedLyrics {
            result: LyricsResult::NotFound,
            provider_id,
        };
    }

    if let Some(synced) = result.synced_lyrics.as_deref() {
        let mut document = LyricDocument::parse(synced);
        if document.track.is_empty() {
            warn!("LRCLIB synced lyrics had no timed lines (id: {})", result.id);
        } else {
            debug!(
                "Got synced lyrics with {} lines (lrclib id: {})",
                document.track.len(),
                result.id
            );
            document.metadata = LrcMetadata {
                artist: result.artist_name,
                title: result.track_name,
                album: result.album_name,
                song_id: Some(result.id),
                ..document.metadata
            };
            return FetchedLyrics {
                result: LyricsResult::Synced(document),
                provider_id,
            };
        }
    }

    // Fall back to plain lyrics
    if let Some(plain) = result.plain_lyrics.filter(|p| !p.trim().is_empty()) {
        debug!("Got plain lyrics (lrclib id: {})", result.id);
        return FetchedLyrics {
            result: LyricsResult::Unsynced(plain),
            provider_id,
        };
    }

    FetchedLyrics {
        result: LyricsResult::NotFound,
        provider_id,
    }
}
