use std::path::Path;

use clap::Subcommand;
use jitai_core::ContentType;
use serde_json::json;

use super::{open_engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum ArmsAction {
    /// Posterior statistics for every arm, or one
    Show {
        #[arg(long)]
        arm: Option<String>,
    },
    /// Reset every arm to the uniform prior
    Reset,
}

pub fn run(action: ArmsAction, db: Option<&Path>) -> CmdResult {
    let engine = open_engine(db)?;
    match action {
        ArmsAction::Show { arm: Some(arm) } => {
            print_json(&engine.bandit().get_arm_stats(ContentType::parse(&arm)?))
        }
        ArmsAction::Show { arm: None } => print_json(&json!({
            "total_pulls": engine.bandit().total_pulls(),
            "has_sufficient_data": engine.bandit().has_sufficient_data(),
            "frequency_multiplier": engine.get_frequency_multiplier(),
            "arms": engine.get_content_effectiveness(),
        })),
        ArmsAction::Reset => {
            engine.reset_bandit();
            print_json(&json!({ "reset": true }))
        }
    }
}
