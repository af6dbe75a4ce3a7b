use sea_orm::entity::prelude::*;

/// Rank carried by a movie that was absent from the latest fetch.
pub const STALE_RANK: i32 = -1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tmdb_id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub synopsis: String,
    #[sea_orm(column_type = "Double")]
    pub vote_average: f64,
    pub release_date: String,
    pub rank: i32,
    pub favorite: bool,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::trailer::Entity")]
    Trailer,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
}

impl Related<super::trailer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trailer.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
