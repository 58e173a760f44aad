use std::path::Path;

use clap::Args;
use serde_json::json;

use super::{open_engine, print_json, CmdResult};

#[derive(Args, Debug)]
pub struct BurdenArgs {
    /// Bypass the assessment cache
    #[arg(long)]
    pub refresh: bool,
}

pub async fn run(args: BurdenArgs, db: Option<&Path>) -> CmdResult {
    let engine = open_engine(db)?;
    let report = engine.burden_report(args.refresh).await;
    print_json(&json!({
        "effective_level": report.effective_level(),
        "cooldown_multiplier": report.get_recommended_cooldown_multiplier(),
        "report": report,
        "trend": engine.get_burden_trend(),
    }))
}
