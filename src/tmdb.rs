use std::{future::Future, num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::{DiscoveredMovie, RemoteReview, RemoteTrailer, SortOrder},
};

/// Remote movie catalog consumed by a reconciliation pass.
pub trait Catalog: Send + Sync {
    fn discover(&self, sort: SortOrder) -> impl Future<Output = AppResult<Vec<DiscoveredMovie>>> + Send;

    fn trailers(&self, movie_id: i32) -> impl Future<Output = AppResult<Vec<RemoteTrailer>>> + Send;

    fn reviews(&self, movie_id: i32) -> impl Future<Output = AppResult<Vec<RemoteReview>>> + Send;
}

pub struct TmdbClient {
    client: wreq::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: wreq::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("no TMDB_API_KEY provided, catalog requests will be rejected");
        }

        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, api_key, base_url, limiter }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        self.limiter.until_ready().await;

        let body = self
            .client
            .get(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|err| AppError::malformed(endpoint, err))
    }
}

impl Catalog for TmdbClient {
    async fn discover(&self, sort: SortOrder) -> AppResult<Vec<DiscoveredMovie>> {
        debug!(sort = ?sort, "discovering movies");
        let query: Vec<(&str, &str)> =
            sort.as_query_key().map(|key| vec![("sort_by", key)]).unwrap_or_default();
        let page: Page<DiscoveredMovie> = self.get_json("discover", "/discover/movie", &query).await?;
        Ok(page.results)
    }

    async fn trailers(&self, movie_id: i32) -> AppResult<Vec<RemoteTrailer>> {
        let page: Page<RemoteTrailer> =
            self.get_json("videos", &format!("/movie/{movie_id}/videos"), &[]).await?;
        Ok(page.results)
    }

    async fn reviews(&self, movie_id: i32) -> AppResult<Vec<RemoteReview>> {
        let page: Page<RemoteReview> =
            self.get_json("reviews", &format!("/movie/{movie_id}/reviews"), &[]).await?;
        Ok(page.results)
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}
