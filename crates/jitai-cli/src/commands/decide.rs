use std::path::Path;

use clap::Args;
use jitai_core::InterventionType;

use super::context::ContextArgs;
use super::{open_engine, print_json, CmdResult};

#[derive(Args, Debug)]
pub struct DecideArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// REMINDER or TIMER
    #[arg(long = "type", default_value = "REMINDER")]
    pub intervention_type: String,

    /// Milliseconds the current session has run
    #[arg(long, default_value_t = 0)]
    pub session_ms: i64,

    /// Start the cooldown clock when the intervention is allowed
    #[arg(long)]
    pub record: bool,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub context: ContextArgs,
}

pub async fn run_decide(args: DecideArgs, db: Option<&Path>) -> CmdResult {
    let intervention_type = InterventionType::parse(&args.intervention_type)?;
    let ctx = args.context.build()?;
    let engine = open_engine(db)?;

    let decision = engine.decide(&ctx, intervention_type, args.session_ms).await;
    if decision.rate_limit.allowed && args.record {
        engine.record_intervention(intervention_type);
    }
    print_json(&decision)
}

pub fn run_select(args: SelectArgs, db: Option<&Path>) -> CmdResult {
    let ctx = args.context.build()?;
    let engine = open_engine(db)?;
    print_json(&engine.select_content_type(&ctx, None, None))
}
