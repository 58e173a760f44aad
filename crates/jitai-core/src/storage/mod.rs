//! Persistence boundaries consumed by the decision core.
//!
//! - [`OutcomeStore`]: append-only intervention outcomes, read in bounded,
//!   paged time ranges. This is the only asynchronous boundary in the core.
//! - [`KeyValueStore`]: small atomic key writes used for bandit posteriors and
//!   cooldown clocks.
//!
//! [`Database`] implements both on SQLite; [`MemoryOutcomeStore`] and
//! [`MemoryKeyValueStore`] back tests and embedded use.

mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{
    BanditConfig, BurdenConfig, BurdenRuleConfig, Config, CooldownConfig, RecoveryConfig,
    SelectorConfig, TimingConfig,
};
pub use database::Database;
pub use memory::{MemoryKeyValueStore, MemoryOutcomeStore};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{ConfigError, Result, ValidationError};
use crate::model::InterventionOutcomeRecord;

/// Upper bound on pages fetched by [`read_range_paged`].
pub const MAX_PAGES: usize = 200;

/// Queryable, append-only outcome history.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Append a record and return its row id.
    async fn append(&self, record: &InterventionOutcomeRecord) -> Result<i64>;

    /// All records with `start_ms <= timestamp <= end_ms`, oldest first.
    async fn results_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<InterventionOutcomeRecord>>;

    /// One page of [`results_in_range`](Self::results_in_range).
    async fn results_page(
        &self,
        start_ms: i64,
        end_ms: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<InterventionOutcomeRecord>> {
        let all = self.results_in_range(start_ms, end_ms).await?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

/// Persisted string key-value state. Each `set` is one atomic write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Read a time range page by page until a short page or [`MAX_PAGES`].
///
/// # Errors
/// Returns an error for an inverted range or a failed page read.
pub async fn read_range_paged(
    store: &dyn OutcomeStore,
    start_ms: i64,
    end_ms: i64,
    page_size: usize,
) -> Result<Vec<InterventionOutcomeRecord>> {
    if end_ms < start_ms {
        return Err(ValidationError::InvalidTimeRange {
            start: start_ms,
            end: end_ms,
        }
        .into());
    }
    let page_size = page_size.max(1);
    let mut records = Vec::new();
    for page in 0..MAX_PAGES {
        let batch = store
            .results_page(start_ms, end_ms, page * page_size, page_size)
            .await?;
        let short = batch.len() < page_size;
        records.extend(batch);
        if short {
            return Ok(records);
        }
    }
    tracing::warn!(
        pages = MAX_PAGES,
        page_size,
        "outcome read truncated at page limit"
    );
    Ok(records)
}

/// Returns `~/.config/jitai[-dev]/` based on JITAI_ENV.
///
/// Set JITAI_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("JITAI_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("jitai-dev")
    } else {
        base_dir.join("jitai")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
