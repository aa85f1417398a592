use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc::UnboundedReceiver,
};

use crate::{
    aggregate::{format_hours, DailySummary},
    models::Session,
    reminder::{ReminderOutcome, ReminderResponse},
    settings::SettingsStore,
    tracker::{CheckInOptions, TrackerController, TrackerEvent, TrackerSnapshot},
};

/// Track work sessions: check in and out, pause, take breaks, and get
/// reminded when a break is due.
#[derive(Parser, Debug)]
#[command(name = "punchcard", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the database and settings file
    #[arg(long, global = true, env = "PUNCHCARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Whose sessions to track
    #[arg(long, global = true, env = "PUNCHCARD_OWNER", default_value = "default")]
    pub owner: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new session
    CheckIn {
        /// Remind me to take a break after this many minutes
        #[arg(long, value_name = "MIN")]
        break_after: Option<u32>,

        /// Planned break length
        #[arg(long, value_name = "MIN")]
        break_minutes: Option<u32>,
    },
    /// Pause the open session
    Pause,
    /// Start a break now
    Break,
    /// Resume after a pause or break
    Resume,
    /// Finish the open session
    CheckOut,
    /// Show the open session
    Status,
    /// Hours worked on one day (default today)
    Today {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Hours per day over seven days
    Week {
        /// First day; defaults to six days before today
        #[arg(long, value_name = "YYYY-MM-DD")]
        from: Option<NaiveDate>,
    },
    /// Sessions and pauses of one day
    History {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Push the break reminder back
    Snooze {
        #[arg(long, value_name = "MIN")]
        minutes: Option<u32>,
    },
    /// Drop the break reminder for this session
    Skip,
    /// Show or change settings
    Config {
        #[arg(long, value_name = "MIN")]
        break_after: Option<u32>,

        #[arg(long, value_name = "MIN")]
        break_minutes: Option<u32>,

        #[arg(long, value_name = "MIN")]
        snooze: Option<u32>,
    },
    /// Follow the open session and answer reminders (b = break, s = snooze,
    /// k = skip, q = quit)
    Watch,
}

pub async fn execute(
    controller: &TrackerController,
    settings: &SettingsStore,
    command: Command,
    events: UnboundedReceiver<TrackerEvent>,
) -> Result<()> {
    match command {
        Command::CheckIn {
            break_after,
            break_minutes,
        } => {
            let session = controller
                .check_in(CheckInOptions {
                    break_after: break_after.map(|m| Duration::minutes(i64::from(m))),
                    break_duration_minutes: break_minutes,
                })
                .await?;
            println!("Checked in at {}", session.check_in_time.format("%H:%M"));
            if let Some(due) = session.break_scheduled_time {
                println!("Break reminder at {}", due.format("%H:%M"));
            }
        }
        Command::Pause => print_session("Paused", &controller.pause().await?),
        Command::Break => print_session("On break", &controller.take_break().await?),
        Command::Resume => print_session("Resumed", &controller.resume().await?),
        Command::CheckOut => {
            let session = controller.check_out().await?;
            println!(
                "Checked out: {}",
                format_hours(session.duration_hours.unwrap_or_default())
            );
        }
        Command::Status => print_snapshot(&controller.snapshot().await),
        Command::Today { date } => print_summary(&controller.daily_summary(date).await?),
        Command::Week { from } => {
            let from = from.unwrap_or_else(|| today(controller) - Duration::days(6));
            let days = controller.range_summary(from, from + Duration::days(6)).await?;
            for day in &days {
                print_summary(day);
            }
            let total: f64 = days.iter().map(|d| d.total_hours).sum();
            println!("Total      {}", format_hours(total));
        }
        Command::History { date } => {
            let date = date.unwrap_or_else(|| today(controller));
            for session in controller.sessions_for_day(date).await? {
                print_history(controller, &session).await?;
            }
        }
        Command::Snooze { minutes } => {
            let offset = minutes.map(|m| Duration::minutes(i64::from(m)));
            print_outcome(controller.respond(ReminderResponse::Snooze(offset)).await?);
        }
        Command::Skip => print_outcome(controller.respond(ReminderResponse::Skip).await?),
        Command::Config {
            break_after,
            break_minutes,
            snooze,
        } => {
            let mut current = settings.current();
            if break_after.is_some() || break_minutes.is_some() || snooze.is_some() {
                if let Some(minutes) = break_after {
                    current.default_break_after_minutes = (minutes > 0).then_some(minutes);
                }
                if let Some(minutes) = break_minutes {
                    current.break_duration_minutes = minutes;
                }
                if let Some(minutes) = snooze {
                    current.snooze_minutes = minutes;
                }
                settings.update(current.clone())?;
            }
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
        Command::Watch => watch(controller, events).await?,
    }
    Ok(())
}

fn today(controller: &TrackerController) -> NaiveDate {
    controller
        .settings()
        .day_boundary()
        .date_of(controller.now())
}

async fn watch(
    controller: &TrackerController,
    mut events: UnboundedReceiver<TrackerEvent>,
) -> Result<()> {
    print_snapshot(&controller.snapshot().await);
    println!("b = start break, s = snooze, k = skip, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let response = match line.trim() {
                    "b" => ReminderResponse::StartBreak,
                    "s" => ReminderResponse::Snooze(None),
                    "k" => ReminderResponse::Skip,
                    "q" => break,
                    "" => continue,
                    other => {
                        println!("unknown key {other:?}");
                        continue;
                    }
                };
                match controller.respond(response).await {
                    Ok(outcome) => print_outcome(outcome),
                    Err(err) => println!("{}", err.user_message()),
                }
            }
        }
    }
    Ok(())
}

fn print_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::Heartbeat(snapshot) | TrackerEvent::StateChanged(snapshot) => {
            print_snapshot(snapshot)
        }
        TrackerEvent::ReminderFired(fired) => match fired.break_duration_minutes {
            Some(minutes) => println!("** Time for a {minutes}-minute break [b/s/k]"),
            None => println!("** Time for a break [b/s/k]"),
        },
        TrackerEvent::ReminderCleared { .. } => {}
        TrackerEvent::BreakOver(_) => println!("** Break is over"),
        TrackerEvent::SessionCompleted(session) => println!(
            "Session completed: {}",
            format_hours(session.duration_hours.unwrap_or_default())
        ),
        TrackerEvent::MutationFailed { message } => println!("{message}"),
    }
}

fn print_snapshot(snapshot: &TrackerSnapshot) {
    let Some(session) = &snapshot.session else {
        println!("Not checked in");
        return;
    };
    let worked = format_hours(snapshot.worked_seconds as f64 / 3600.0);
    let mut line = format!("{} | worked {worked}", session.status);
    if snapshot.current_pause_seconds > 0 {
        line.push_str(&format!(" | idle {}m", snapshot.current_pause_seconds / 60));
    }
    if let Some(ends) = snapshot.break_ends_at {
        line.push_str(&format!(" | break ends {}", ends.format("%H:%M")));
    } else if let Some(due) = session.break_scheduled_time {
        line.push_str(&format!(" | break due {}", due.format("%H:%M")));
    }
    if snapshot.pending {
        line.push_str(" | saving");
    }
    println!("{line}");
}

fn print_session(label: &str, session: &Session) {
    println!("{label} ({})", session.status);
}

fn print_summary(summary: &DailySummary) {
    let live = if summary.open_session.is_some() {
        " (in progress)"
    } else {
        ""
    };
    println!(
        "{}  {}  {} session(s){live}",
        summary.date,
        format_hours(summary.total_hours),
        summary.completed_sessions
    );
}

async fn print_history(controller: &TrackerController, session: &Session) -> Result<()> {
    let end = session
        .check_out_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "now".to_string());
    println!(
        "{} - {}  {}  {}",
        session.check_in_time.format("%H:%M"),
        end,
        session.status,
        session
            .duration_hours
            .map(format_hours)
            .unwrap_or_else(|| "-".to_string())
    );
    for pause in controller.pauses(&session.id).await? {
        println!(
            "    {} {} - {} ({}m)",
            pause.kind.as_str(),
            pause.started_at.format("%H:%M"),
            pause.ended_at.format("%H:%M"),
            pause.duration_seconds / 60
        );
    }
    Ok(())
}

fn print_outcome(outcome: ReminderOutcome) {
    match outcome {
        ReminderOutcome::BreakStarted => println!("Break started"),
        ReminderOutcome::Snoozed { until } => println!("Snoozed until {}", until.format("%H:%M")),
        ReminderOutcome::Skipped => println!("Break reminder skipped"),
        ReminderOutcome::Ignored => println!("No break reminder to answer"),
    }
}
