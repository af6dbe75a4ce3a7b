use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(integer(Movie::TmdbId))
                    .col(string(Movie::Title))
                    .col(string_null(Movie::PosterPath))
                    .col(text(Movie::Synopsis))
                    .col(double(Movie::VoteAverage))
                    .col(string(Movie::ReleaseDate))
                    .col(integer(Movie::Rank).default(-1))
                    .col(boolean(Movie::Favorite).default(false))
                    .col(big_integer(Movie::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_tmdb_id_unique")
                    .table(Movie::Table)
                    .col(Movie::TmdbId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trailer::Table)
                    .if_not_exists()
                    .col(pk_auto(Trailer::Id))
                    .col(string(Trailer::TmdbId))
                    .col(integer(Trailer::MovieId))
                    .col(string(Trailer::Key))
                    .col(string(Trailer::Name))
                    .col(string(Trailer::Site))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trailer_movie")
                            .from(Trailer::Table, Trailer::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trailer_movie_id")
                    .table(Trailer::Table)
                    .col(Trailer::MovieId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(pk_auto(Review::Id))
                    .col(string(Review::TmdbId))
                    .col(integer(Review::MovieId))
                    .col(string(Review::Author))
                    .col(text(Review::Content))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_movie")
                            .from(Review::Table, Review::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_review_movie_id")
                    .table(Review::Table)
                    .col(Review::MovieId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Review::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Trailer::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    TmdbId,
    Title,
    PosterPath,
    Synopsis,
    VoteAverage,
    ReleaseDate,
    Rank,
    Favorite,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Trailer {
    Table,
    Id,
    TmdbId,
    MovieId,
    Key,
    Name,
    Site,
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    TmdbId,
    MovieId,
    Author,
    Content,
}
