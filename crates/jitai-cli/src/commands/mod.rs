//! Command handlers. Every handler prints one JSON document to stdout.

pub mod arms;
pub mod burden;
pub mod config;
pub mod context;
pub mod decide;
pub mod history;
pub mod outcome;
pub mod timing;

use std::path::Path;
use std::sync::Arc;

use jitai_core::{Config, Database, InterventionEngine};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Engine over the configured database, or `db` when given.
pub fn open_engine(db: Option<&Path>) -> Result<InterventionEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing::debug!(db = ?db, "opening engine");
    let database = match db {
        Some(path) => Database::open_at(path)?,
        None => Database::open()?,
    };
    Ok(InterventionEngine::with_database(config, Arc::new(database)))
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
