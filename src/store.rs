use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};

use crate::{
    entities::{
        movie::{self, STALE_RANK},
        review, trailer,
    },
    error::AppResult,
    models::{DiscoveredMovie, MovieDetail, RemoteReview, RemoteTrailer},
};

/// Read side of the movie cache plus the user-controlled favorite flag.
#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn ranked(&self) -> AppResult<Vec<movie::Model>> {
        let movies = movie::Entity::find()
            .filter(movie::Column::Rank.gte(0))
            .order_by_asc(movie::Column::Rank)
            .all(&self.db)
            .await?;
        Ok(movies)
    }

    pub async fn favorites(&self) -> AppResult<Vec<movie::Model>> {
        let movies = movie::Entity::find()
            .filter(movie::Column::Favorite.eq(true))
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await?;
        Ok(movies)
    }

    pub async fn detail(&self, tmdb_id: i32) -> AppResult<Option<MovieDetail>> {
        let Some(m) = find_by_tmdb_id(&self.db, tmdb_id).await? else {
            return Ok(None);
        };

        let trailers = trailer::Entity::find()
            .filter(trailer::Column::MovieId.eq(m.id))
            .order_by_asc(trailer::Column::Id)
            .all(&self.db)
            .await?;
        let reviews = review::Entity::find()
            .filter(review::Column::MovieId.eq(m.id))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;

        Ok(Some(MovieDetail::new(m, trailers, reviews)))
    }

    /// Returns the updated row, or `None` if no movie has that catalog id.
    pub async fn set_favorite(&self, tmdb_id: i32, favorite: bool) -> AppResult<Option<movie::Model>> {
        let Some(m) = find_by_tmdb_id(&self.db, tmdb_id).await? else {
            return Ok(None);
        };

        let mut active: movie::ActiveModel = m.into();
        active.favorite = Set(favorite);
        let updated = active.update(&self.db).await?;
        Ok(Some(updated))
    }
}

pub async fn find_by_tmdb_id<C: ConnectionTrait>(
    conn: &C,
    tmdb_id: i32,
) -> AppResult<Option<movie::Model>> {
    let m = movie::Entity::find().filter(movie::Column::TmdbId.eq(tmdb_id)).one(conn).await?;
    Ok(m)
}

/// Sets every movie's rank to the stale sentinel.
pub async fn mark_all_stale<C: ConnectionTrait>(conn: &C) -> AppResult<u64> {
    let res = movie::Entity::update_many()
        .col_expr(movie::Column::Rank, Expr::value(STALE_RANK))
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

/// Inserts or refreshes the catalog fields and rank of a movie, keeping its
/// favorite flag. Returns the local key.
pub async fn upsert_movie<C: ConnectionTrait>(
    conn: &C,
    item: &DiscoveredMovie,
    rank: i32,
) -> AppResult<i32> {
    let model = movie::ActiveModel {
        id: Default::default(),
        tmdb_id: Set(item.id),
        title: Set(item.title.clone()),
        poster_path: Set(item.poster_path.clone()),
        synopsis: Set(item.overview.clone()),
        vote_average: Set(item.vote_average),
        release_date: Set(item.release_date.clone()),
        rank: Set(rank),
        favorite: Set(false),
        updated_at: Set(now_sec()),
    };

    movie::Entity::insert(model)
        .on_conflict(
            OnConflict::column(movie::Column::TmdbId)
                .update_columns([
                    movie::Column::Title,
                    movie::Column::PosterPath,
                    movie::Column::Synopsis,
                    movie::Column::VoteAverage,
                    movie::Column::ReleaseDate,
                    movie::Column::Rank,
                    movie::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let id = movie::Entity::find()
        .select_only()
        .column(movie::Column::Id)
        .filter(movie::Column::TmdbId.eq(item.id))
        .into_tuple::<i32>()
        .one(conn)
        .await?
        .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("movie {}", item.id)))?;
    Ok(id)
}

/// Drops the movie's trailers and writes `fresh` in their place.
pub async fn replace_trailers<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    fresh: &[RemoteTrailer],
) -> AppResult<usize> {
    trailer::Entity::delete_many()
        .filter(trailer::Column::MovieId.eq(movie_id))
        .exec(conn)
        .await?;

    if fresh.is_empty() {
        return Ok(0);
    }

    let rows = fresh.iter().map(|t| trailer::ActiveModel {
        id: Default::default(),
        tmdb_id: Set(t.id.clone()),
        movie_id: Set(movie_id),
        key: Set(t.key.clone()),
        name: Set(t.name.clone()),
        site: Set(t.site.clone()),
    });
    trailer::Entity::insert_many(rows).exec_without_returning(conn).await?;
    Ok(fresh.len())
}

/// Drops the movie's reviews and writes `fresh` in their place.
pub async fn replace_reviews<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    fresh: &[RemoteReview],
) -> AppResult<usize> {
    review::Entity::delete_many()
        .filter(review::Column::MovieId.eq(movie_id))
        .exec(conn)
        .await?;

    if fresh.is_empty() {
        return Ok(0);
    }

    let rows = fresh.iter().map(|r| review::ActiveModel {
        id: Default::default(),
        tmdb_id: Set(r.id.clone()),
        movie_id: Set(movie_id),
        author: Set(r.author.clone()),
        content: Set(r.content.clone()),
    });
    review::Entity::insert_many(rows).exec_without_returning(conn).await?;
    Ok(fresh.len())
}

/// Deletes every stale, non-favorite movie together with its trailers and
/// reviews. Returns the number of movies removed.
pub async fn delete_stale<C: ConnectionTrait>(conn: &C) -> AppResult<u64> {
    let stale = Condition::all()
        .add(movie::Column::Favorite.eq(false))
        .add(movie::Column::Rank.eq(STALE_RANK));

    let ids: Vec<i32> = movie::Entity::find()
        .select_only()
        .column(movie::Column::Id)
        .filter(stale.clone())
        .into_tuple()
        .all(conn)
        .await?;

    if ids.is_empty() {
        return Ok(0);
    }

    trailer::Entity::delete_many()
        .filter(trailer::Column::MovieId.is_in(ids.clone()))
        .exec(conn)
        .await?;
    review::Entity::delete_many()
        .filter(review::Column::MovieId.is_in(ids.clone()))
        .exec(conn)
        .await?;

    let res = movie::Entity::delete_many()
        .filter(movie::Column::Id.is_in(ids))
        .filter(stale)
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
pub(crate) mod tests {
    use sea_orm::PaginatorTrait;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::db;

    pub(crate) async fn memory_store() -> MovieStore {
        let db = db::connect_and_migrate("sqlite::memory:").await.unwrap();
        MovieStore::new(db)
    }

    pub(crate) fn discovered(id: i32, title: &str) -> DiscoveredMovie {
        DiscoveredMovie {
            id,
            title: title.to_string(),
            poster_path: Some(format!("/{id}.jpg")),
            overview: format!("{title} synopsis"),
            vote_average: 7.5,
            release_date: "2024-05-01".to_string(),
        }
    }

    fn remote_trailer(id: &str) -> RemoteTrailer {
        RemoteTrailer {
            id: id.to_string(),
            key: format!("yt-{id}"),
            name: "Official Trailer".to_string(),
            site: "YouTube".to_string(),
        }
    }

    fn remote_review(id: &str) -> RemoteReview {
        RemoteReview { id: id.to_string(), author: "critic".to_string(), content: "fine".to_string() }
    }

    #[tokio::test]
    async fn upsert_keeps_favorite_and_local_key() {
        let store = memory_store().await;
        let conn = store.db();

        let id = upsert_movie(conn, &discovered(10, "Alien"), 3).await.unwrap();
        store.set_favorite(10, true).await.unwrap();

        let mut renamed = discovered(10, "Alien (Director's Cut)");
        renamed.vote_average = 8.9;
        let again = upsert_movie(conn, &renamed, 0).await.unwrap();
        assert_eq!(id, again);

        let m = find_by_tmdb_id(conn, 10).await.unwrap().unwrap();
        assert_eq!(m.title, "Alien (Director's Cut)");
        assert_eq!(m.rank, 0);
        assert!(m.favorite);
        assert_eq!(movie::Entity::find().count(conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_trailers_drops_previous_rows() {
        let store = memory_store().await;
        let conn = store.db();
        let id = upsert_movie(conn, &discovered(1, "Heat"), 0).await.unwrap();

        replace_trailers(conn, id, &[remote_trailer("a"), remote_trailer("b")]).await.unwrap();
        replace_trailers(conn, id, &[remote_trailer("c")]).await.unwrap();
        replace_reviews(conn, id, &[remote_review("r1")]).await.unwrap();
        replace_reviews(conn, id, &[]).await.unwrap();

        let detail = store.detail(1).await.unwrap().unwrap();
        assert_eq!(detail.trailers.len(), 1);
        assert_eq!(detail.trailers[0].key, "yt-c");
        assert!(detail.reviews.is_empty());
    }

    #[tokio::test]
    async fn delete_stale_spares_favorites_and_ranked() {
        let store = memory_store().await;
        let conn = store.db();

        let fav = upsert_movie(conn, &discovered(1, "Favorite"), 0).await.unwrap();
        let gone = upsert_movie(conn, &discovered(2, "Gone"), 1).await.unwrap();
        store.set_favorite(1, true).await.unwrap();
        replace_trailers(conn, fav, &[remote_trailer("f")]).await.unwrap();
        replace_trailers(conn, gone, &[remote_trailer("g")]).await.unwrap();
        replace_reviews(conn, gone, &[remote_review("g")]).await.unwrap();

        assert_eq!(mark_all_stale(conn).await.unwrap(), 2);
        upsert_movie(conn, &discovered(3, "Fresh"), 0).await.unwrap();

        assert_eq!(delete_stale(conn).await.unwrap(), 1);
        assert!(find_by_tmdb_id(conn, 2).await.unwrap().is_none());
        assert_eq!(find_by_tmdb_id(conn, 1).await.unwrap().unwrap().rank, STALE_RANK);
        assert_eq!(find_by_tmdb_id(conn, 3).await.unwrap().unwrap().rank, 0);

        let orphans = trailer::Entity::find()
            .filter(trailer::Column::MovieId.eq(gone))
            .count(conn)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(trailer::Entity::find().count(conn).await.unwrap(), 1);
        assert_eq!(review::Entity::find().count(conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ranked_hides_stale_favorites() {
        let store = memory_store().await;
        let conn = store.db();
        upsert_movie(conn, &discovered(1, "B"), 1).await.unwrap();
        upsert_movie(conn, &discovered(2, "A"), 0).await.unwrap();
        upsert_movie(conn, &discovered(3, "C"), STALE_RANK).await.unwrap();
        store.set_favorite(3, true).await.unwrap();

        let ranked: Vec<i32> = store.ranked().await.unwrap().iter().map(|m| m.tmdb_id).collect();
        assert_eq!(ranked, vec![2, 1]);

        let favorites = store.favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].tmdb_id, 3);
    }

    #[tokio::test]
    async fn set_favorite_on_unknown_movie_is_none() {
        let store = memory_store().await;
        assert!(store.set_favorite(404, true).await.unwrap().is_none());
        assert!(store.detail(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn migrations_apply_to_fresh_database() {
        let store = memory_store().await;
        let pending = migration::Migrator::get_pending_migrations(store.db()).await.unwrap();
        assert!(pending.is_empty());
        assert_eq!(movie::Entity::find().count(store.db()).await.unwrap(), 0);
    }
}
