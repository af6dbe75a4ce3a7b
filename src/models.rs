use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::{movie, review, trailer};

/// Ordering requested from the catalog's discover endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Popularity,
    Rating,
    /// No `sort_by` parameter at all; the catalog picks its own order.
    Unsorted,
}

impl SortOrder {
    pub fn from_preference(pref: &str) -> Self {
        match pref.trim() {
            "popularity" => SortOrder::Popularity,
            "rating" => SortOrder::Rating,
            other => {
                tracing::warn!(preference = %other, "unrecognized sort preference, discovering unsorted");
                SortOrder::Unsorted
            },
        }
    }

    pub fn as_query_key(self) -> Option<&'static str> {
        match self {
            SortOrder::Popularity => Some("popularity.desc"),
            SortOrder::Rating => Some("vote_average.desc"),
            SortOrder::Unsorted => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DiscoveredMovie {
    pub id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date: String,
}

impl DiscoveredMovie {
    /// Entries without a poster are incomplete and never stored.
    pub fn poster(&self) -> Option<&str> {
        self.poster_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RemoteTrailer {
    pub id: String,
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub site: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RemoteReview {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieSummary {
    pub tmdb_id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub release_date: String,
    pub rank: i32,
    pub favorite: bool,
}

impl From<movie::Model> for MovieSummary {
    fn from(m: movie::Model) -> Self {
        Self {
            tmdb_id: m.tmdb_id,
            title: m.title,
            poster_path: m.poster_path,
            vote_average: m.vote_average,
            release_date: m.release_date,
            rank: m.rank,
            favorite: m.favorite,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TrailerView {
    pub key: String,
    pub name: String,
    pub site: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewView {
    pub author: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub synopsis: String,
    pub trailers: Vec<TrailerView>,
    pub reviews: Vec<ReviewView>,
}

impl MovieDetail {
    pub fn new(m: movie::Model, trailers: Vec<trailer::Model>, reviews: Vec<review::Model>) -> Self {
        let synopsis = m.synopsis.clone();
        Self {
            movie: m.into(),
            synopsis,
            trailers: trailers
                .into_iter()
                .map(|t| TrailerView { key: t.key, name: t.name, site: t.site })
                .collect(),
            reviews: reviews
                .into_iter()
                .map(|r| ReviewView { author: r.author, content: r.content })
                .collect(),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub sort: SortOrder,
    pub fetched: usize,
    pub skipped_no_poster: usize,
    pub upserted: usize,
    pub trailers: usize,
    pub reviews: usize,
    pub deleted: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    pub passes: u64,
    pub failures: u64,
    pub last_finished_at: Option<jiff::Timestamp>,
    pub last_report: Option<SyncReport>,
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub sort_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_preference_resolves_to_query_key() {
        assert_eq!(SortOrder::from_preference("popularity").as_query_key(), Some("popularity.desc"));
        assert_eq!(SortOrder::from_preference("rating").as_query_key(), Some("vote_average.desc"));
    }

    #[test]
    fn unknown_sort_preference_is_unsorted() {
        assert_eq!(SortOrder::from_preference("release_date"), SortOrder::Unsorted);
        assert_eq!(SortOrder::from_preference(""), SortOrder::Unsorted);
        assert_eq!(SortOrder::Unsorted.as_query_key(), None);
    }

    #[test]
    fn blank_poster_counts_as_missing() {
        let json = r#"{"id": 1, "title": "Heat", "poster_path": "  "}"#;
        let movie: DiscoveredMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.poster(), None);
        assert_eq!(movie.overview, "");
    }

    #[test]
    fn discovered_movie_requires_id() {
        let json = r#"{"title": "Heat", "poster_path": "/heat.jpg"}"#;
        assert!(serde_json::from_str::<DiscoveredMovie>(json).is_err());
    }

    #[test]
    fn null_text_fields_become_empty() {
        let json = r#"{"id": "5a1", "author": null, "content": null}"#;
        let review: RemoteReview = serde_json::from_str(json).unwrap();
        assert_eq!(review.author, "");
        assert_eq!(review.content, "");
    }
}
