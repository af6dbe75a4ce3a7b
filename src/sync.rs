use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    error::AppResult,
    models::{DiscoveredMovie, RemoteReview, RemoteTrailer, SortOrder, SyncReport},
    store,
    tmdb::Catalog,
};

/// How a reconciliation pass commits its writes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PassMode {
    /// Every catalog request completes first, then stale marking, upserts and
    /// deletes share one short transaction.
    #[default]
    Atomic,
    /// Each write commits on its own; a failure mid-pass leaves the store
    /// partially reconciled.
    Incremental,
}

pub struct Syncer<K> {
    db: DatabaseConnection,
    catalog: Arc<K>,
    sort: watch::Receiver<SortOrder>,
    mode: PassMode,
}

impl<K: Catalog> Syncer<K> {
    pub fn new(
        db: DatabaseConnection,
        catalog: Arc<K>,
        sort: watch::Receiver<SortOrder>,
        mode: PassMode,
    ) -> Self {
        Self { db, catalog, sort, mode }
    }

    /// Runs one pass with the sort preference current at call time.
    pub async fn run_pass(&self) -> AppResult<SyncReport> {
        let sort = *self.sort.borrow();
        info!(sort = ?sort, mode = ?self.mode, "starting reconciliation pass");

        let listing = self.catalog.discover(sort).await?;
        debug!(fetched = listing.len(), "discover returned");

        let report = match self.mode {
            PassMode::Atomic => {
                let details = fetch_details(&*self.catalog, &listing).await?;
                let txn = self.db.begin().await?;
                let report = apply(&txn, sort, &listing, &details).await?;
                txn.commit().await?;
                report
            },
            PassMode::Incremental => reconcile(&self.db, &*self.catalog, sort, &listing).await?,
        };

        info!(
            fetched = report.fetched,
            skipped = report.skipped_no_poster,
            upserted = report.upserted,
            deleted = report.deleted,
            "reconciliation pass finished"
        );
        Ok(report)
    }
}

/// A listed movie with its rank and fetched trailers and reviews.
#[derive(Debug)]
pub struct Details<'a> {
    pub item: &'a DiscoveredMovie,
    pub rank: usize,
    pub trailers: Vec<RemoteTrailer>,
    pub reviews: Vec<RemoteReview>,
}

/// Fetches trailers and reviews for every movie in `listing` that has a
/// poster. Touches no storage.
pub async fn fetch_details<'a, K: Catalog>(
    catalog: &K,
    listing: &'a [DiscoveredMovie],
) -> AppResult<Vec<Details<'a>>> {
    let mut details = Vec::new();
    for (rank, item) in listing.iter().enumerate() {
        if item.poster().is_none() {
            debug!(tmdb_id = item.id, title = %item.title, "skipping movie without poster");
            continue;
        }
        let trailers = catalog.trailers(item.id).await?;
        let reviews = catalog.reviews(item.id).await?;
        details.push(Details { item, rank, trailers, reviews });
    }
    Ok(details)
}

/// Writes a fully fetched pass: everything goes stale, each entry in
/// `details` is upserted at its rank with its trailers and reviews replaced,
/// and whatever is still stale and not a favorite is deleted.
pub async fn apply<C: ConnectionTrait>(
    conn: &C,
    sort: SortOrder,
    listing: &[DiscoveredMovie],
    details: &[Details<'_>],
) -> AppResult<SyncReport> {
    let mut report = SyncReport {
        sort,
        fetched: listing.len(),
        skipped_no_poster: listing.len() - details.len(),
        ..Default::default()
    };

    let marked = store::mark_all_stale(conn).await?;
    debug!(marked = marked, "marked local movies stale");

    for d in details {
        let movie_id = store::upsert_movie(conn, d.item, d.rank as i32).await?;
        report.upserted += 1;
        report.trailers += store::replace_trailers(conn, movie_id, &d.trailers).await?;
        report.reviews += store::replace_reviews(conn, movie_id, &d.reviews).await?;
        debug!(tmdb_id = d.item.id, rank = d.rank, "movie refreshed");
    }

    report.deleted = store::delete_stale(conn).await?;
    Ok(report)
}

/// Merges `listing` into the store one movie at a time, writing as each
/// catalog response arrives.
pub async fn reconcile<C, K>(
    conn: &C,
    catalog: &K,
    sort: SortOrder,
    listing: &[DiscoveredMovie],
) -> AppResult<SyncReport>
where
    C: ConnectionTrait,
    K: Catalog,
{
    let mut report = SyncReport { sort, fetched: listing.len(), ..Default::default() };

    let marked = store::mark_all_stale(conn).await?;
    debug!(marked = marked, "marked local movies stale");

    for (rank, item) in listing.iter().enumerate() {
        if item.poster().is_none() {
            debug!(tmdb_id = item.id, title = %item.title, "skipping movie without poster");
            report.skipped_no_poster += 1;
            continue;
        }

        let movie_id = store::upsert_movie(conn, item, rank as i32).await?;
        report.upserted += 1;

        let trailers = catalog.trailers(item.id).await?;
        let reviews = catalog.reviews(item.id).await?;
        report.trailers += store::replace_trailers(conn, movie_id, &trailers).await?;
        report.reviews += store::replace_reviews(conn, movie_id, &reviews).await?;

        debug!(
            tmdb_id = item.id,
            rank = rank,
            trailers = trailers.len(),
            reviews = reviews.len(),
            "movie refreshed"
        );
    }

    report.deleted = store::delete_stale(conn).await?;
    Ok(report)
}
