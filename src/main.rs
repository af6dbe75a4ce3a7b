mod config;
mod db;
mod entities;
mod error;
mod models;
mod routes;
mod scheduler;
mod store;
mod sync;
mod tmdb;

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    config::Config, models::SortOrder, scheduler::SchedulerHandle, store::MovieStore,
    sync::Syncer, tmdb::TmdbClient,
};

pub struct AppState {
    pub store: MovieStore,
    pub scheduler: SchedulerHandle,
    pub sort: watch::Sender<SortOrder>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelsync=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = wreq::Client::builder().timeout(Duration::from_secs(30)).build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = MovieStore::new(db);

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );

    let (sort, sort_rx) = watch::channel(config.sort_by);
    let syncer = Syncer::new(store.db().clone(), Arc::new(tmdb), sort_rx, config.pass_mode);
    let (scheduler, _sync_task) =
        scheduler::spawn(syncer, config.sync_interval(), config.sync_flex());
    scheduler.ensure_scheduling();

    let state = Arc::new(AppState { store, scheduler, sort });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
