//! Direct writes to the outcome history, for seeding and replay.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Subcommand;
use jitai_core::{
    ContentType, InterventionOutcomeRecord, InterventionType, UserChoice, UserFeedback,
};
use serde_json::json;

use super::{open_engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Append one outcome record
    Add {
        #[arg(long)]
        app: String,
        #[arg(long)]
        arm: String,
        #[arg(long)]
        choice: String,
        #[arg(long)]
        feedback: Option<String>,
        /// Epoch ms (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
        /// Local hour, if it differs from the UTC hour of `timestamp`
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: Option<u8>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..7))]
        day: Option<u8>,
        #[arg(long)]
        snoozed: bool,
        #[arg(long, default_value_t = 0)]
        decision_ms: i64,
        #[arg(long = "type", default_value = "REMINDER")]
        intervention_type: String,
        #[arg(long, default_value = "cli")]
        session_id: String,
    },
    /// Append records from a JSON array file
    Import { file: PathBuf },
}

pub async fn run(action: HistoryAction, db: Option<&Path>) -> CmdResult {
    let engine = open_engine(db)?;
    match action {
        HistoryAction::Add {
            app,
            arm,
            choice,
            feedback,
            timestamp,
            hour,
            day,
            snoozed,
            decision_ms,
            intervention_type,
            session_id,
        } => {
            let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
            let mut record = InterventionOutcomeRecord::new(
                session_id,
                app,
                ContentType::parse(&arm)?,
                UserChoice::parse(&choice),
                timestamp,
            );
            if hour.is_some() || day.is_some() {
                let h = hour.unwrap_or(record.hour_of_day);
                let d = day.unwrap_or(record.day_of_week);
                record = record.at_local_time(h, d);
            }
            record.intervention_type = InterventionType::parse(&intervention_type)?;
            record.user_feedback = UserFeedback::parse_opt(feedback.as_deref());
            record.was_snoozed = snoozed;
            record.time_to_decision_ms = decision_ms;

            let id = engine.log_outcome(&record).await?;
            print_json(&json!({ "id": id, "record": record }))
        }
        HistoryAction::Import { file } => {
            let records: Vec<InterventionOutcomeRecord> =
                serde_json::from_str(&std::fs::read_to_string(file)?)?;
            let mut ids = Vec::with_capacity(records.len());
            for record in &records {
                ids.push(engine.log_outcome(record).await?);
            }
            print_json(&json!({ "imported": ids.len(), "ids": ids }))
        }
    }
}
