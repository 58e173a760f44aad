//! Context assembly from a JSON file and/or flags.

use std::path::PathBuf;

use chrono::{Datelike, Local, Timelike};
use clap::Args;
use jitai_core::InterventionContext;

#[derive(Args, Debug, Default)]
pub struct ContextArgs {
    /// JSON file holding an InterventionContext; flags override its fields
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Target app package or bundle id
    #[arg(long)]
    pub app: Option<String>,

    /// Local hour of day (defaults to now)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    pub hour: Option<u8>,

    /// Day of week, Sunday=0 (defaults to today)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..7))]
    pub day: Option<u8>,

    #[arg(long)]
    pub session_minutes: Option<u32>,

    #[arg(long)]
    pub bout: Option<u32>,

    #[arg(long)]
    pub quick_reopen: bool,

    #[arg(long)]
    pub usage_today: Option<u32>,

    #[arg(long)]
    pub weekly_average: Option<u32>,

    #[arg(long)]
    pub goal: Option<u32>,

    #[arg(long)]
    pub days_since_install: Option<u32>,

    /// Epoch ms when the previous session ended
    #[arg(long)]
    pub last_session_end: Option<i64>,
}

impl ContextArgs {
    /// # Errors
    /// Returns an error if the context file cannot be read or parsed.
    pub fn build(&self) -> Result<InterventionContext, Box<dyn std::error::Error>> {
        let mut ctx = match &self.context {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => {
                let now = Local::now();
                InterventionContext::new(
                    "",
                    now.hour() as u8,
                    now.weekday().num_days_from_sunday() as u8,
                )
            }
        };

        if let Some(app) = &self.app {
            ctx.target_app.clone_from(app);
        }
        if let Some(hour) = self.hour {
            ctx.time_of_day = hour;
        }
        if let Some(day) = self.day {
            ctx.day_of_week = day;
            ctx.is_weekend = day == 0 || day == 6;
        }
        if let Some(minutes) = self.session_minutes {
            ctx.current_session_minutes = minutes;
        }
        if let Some(bout) = self.bout {
            ctx.session_count_this_bout = bout;
        }
        if self.quick_reopen {
            ctx.quick_reopen_attempt = true;
        }
        if let Some(minutes) = self.usage_today {
            ctx.total_usage_today_minutes = minutes;
        }
        if let Some(minutes) = self.weekly_average {
            ctx.weekly_average_minutes = minutes;
        }
        if let Some(goal) = self.goal {
            ctx.goal_minutes = Some(goal);
            ctx.is_over_goal = ctx.total_usage_today_minutes > goal;
        }
        if let Some(days) = self.days_since_install {
            ctx.days_since_install = days;
        }
        if let Some(end) = self.last_session_end {
            ctx.last_session_end_time = Some(end);
        }
        Ok(ctx)
    }
}
