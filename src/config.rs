use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

use crate::{models::SortOrder, sync::PassMode};

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub database_url: String,
    pub tmdb_rps: u32,
    pub sort_by: SortOrder,
    pub sync_hours: u32,
    pub pass_mode: PassMode,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let tmdb_api_key = std::env::var("TMDB_API_KEY").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://reelsync.db?mode=rwc".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let sort_by = SortOrder::from_preference(
            &std::env::var("SORT_BY").unwrap_or_else(|_| "popularity".to_string()),
        );

        let sync_hours =
            parse_sync_hours(&std::env::var("SYNC_HOURS").unwrap_or_else(|_| "4".to_string()))?;

        let pass_mode = match std::env::var("SYNC_MODE").as_deref() {
            Ok("incremental") => PassMode::Incremental,
            Ok("atomic") | Err(_) => PassMode::Atomic,
            Ok(other) => anyhow::bail!("SYNC_MODE must be atomic or incremental, got {other:?}"),
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            tmdb_api_key,
            tmdb_base_url,
            database_url,
            tmdb_rps,
            sort_by,
            sync_hours,
            pass_mode,
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(60 * 60 * u64::from(self.sync_hours))
    }

    /// One hour out of every `sync_hours`.
    pub fn sync_flex(&self) -> Duration {
        self.sync_interval() / self.sync_hours
    }
}

const MAX_SYNC_HOURS: u32 = 24 * 365;

fn parse_sync_hours(raw: &str) -> anyhow::Result<u32> {
    let hours: u32 = raw.trim().parse().context("SYNC_HOURS")?;
    if !(1..=MAX_SYNC_HOURS).contains(&hours) {
        anyhow::bail!("SYNC_HOURS must be between 1 and {MAX_SYNC_HOURS}, got {hours}");
    }
    Ok(hours)
}
