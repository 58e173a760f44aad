use std::path::Path;

use chrono::{Datelike, Local, Timelike};
use clap::Args;
use jitai_core::{
    ContentType, InterventionOutcomeRecord, InterventionType, RewardInput, UserChoice,
    UserFeedback,
};
use serde::Serialize;

use super::{open_engine, print_json, CmdResult};

#[derive(Args, Debug)]
pub struct OutcomeArgs {
    /// Arm that was shown, e.g. QUOTE
    #[arg(long)]
    pub arm: String,

    /// GO_BACK, CONTINUE, DISMISS or TIMEOUT
    #[arg(long)]
    pub choice: String,

    /// HELPFUL or DISRUPTIVE
    #[arg(long)]
    pub feedback: Option<String>,

    #[arg(long)]
    pub session_continued: Option<bool>,

    #[arg(long)]
    pub duration_after_ms: Option<i64>,

    #[arg(long)]
    pub quick_reopen: Option<bool>,

    #[arg(long)]
    pub reopen_delay_ms: Option<i64>,

    /// Also append the outcome to the history
    #[arg(long)]
    pub log: bool,

    /// Target app for the history record
    #[arg(long, default_value = "")]
    pub app: String,

    #[arg(long = "type", default_value = "REMINDER")]
    pub intervention_type: String,

    #[arg(long, default_value = "cli")]
    pub session_id: String,
}

#[derive(Serialize)]
struct OutcomeReport {
    arm: ContentType,
    reward: f64,
    logged_id: Option<i64>,
}

pub async fn run(args: OutcomeArgs, db: Option<&Path>) -> CmdResult {
    let arm = ContentType::parse(&args.arm)?;
    let intervention_type = InterventionType::parse(&args.intervention_type)?;
    let input = RewardInput {
        choice: UserChoice::parse(&args.choice),
        feedback: UserFeedback::parse_opt(args.feedback.as_deref()),
        session_continued: args.session_continued,
        session_duration_after_ms: args.duration_after_ms,
        quick_reopen: args.quick_reopen,
        reopen_delay_ms: args.reopen_delay_ms,
    };

    let engine = open_engine(db)?;
    let reward = engine.record_arm_outcome(arm, &input)?;

    let logged_id = if args.log {
        let now = Local::now();
        let mut record = InterventionOutcomeRecord::new(
            args.session_id,
            args.app,
            arm,
            input.choice,
            now.timestamp_millis(),
        )
        .at_local_time(now.hour() as u8, now.weekday().num_days_from_sunday() as u8);
        record.intervention_type = intervention_type;
        record.user_feedback = input.feedback;
        record.quick_reopen_flag = input.quick_reopen.unwrap_or(false);
        record.session_ended_normally = input.session_continued == Some(false);
        Some(engine.log_outcome(&record).await?)
    } else {
        None
    };

    print_json(&OutcomeReport {
        arm,
        reward,
        logged_id,
    })
}
