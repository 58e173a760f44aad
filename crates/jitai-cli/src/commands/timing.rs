use std::path::Path;

use clap::Args;

use super::{open_engine, print_json, CmdResult};

#[derive(Args, Debug)]
pub struct TimingArgs {
    #[arg(long)]
    pub app: String,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    pub hour: u8,

    #[arg(long)]
    pub weekend: bool,

    /// Bypass the recommendation cache
    #[arg(long)]
    pub refresh: bool,
}

pub async fn run(args: TimingArgs, db: Option<&Path>) -> CmdResult {
    let engine = open_engine(db)?;
    let recommendation = engine
        .timing_recommendation(&args.app, args.hour, args.weekend, args.refresh)
        .await;
    print_json(&recommendation)
}
