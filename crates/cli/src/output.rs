//! Terminal rendering of progress events and subject status.

use colored::Colorize;
use vf_protocol::assessment_models::RiskLevel;
use vf_protocol::ipc::Event;
use vf_protocol::run_models::{RunStatus, SubjectStatus};

pub fn print_event(event: &Event) {
    match event {
        Event::RunStarted { run_id, .. } => {
            println!("{} run {}", "▶".green(), run_id.to_string().dimmed());
        }
        Event::RunStatusUpdate {
            message: Some(message),
            ..
        } => {
            println!("  {}", message.dimmed());
        }
        Event::RunStatusUpdate { message: None, .. } => {}
        Event::StageStarted { stage, .. } => {
            println!("{} {}", "●".blue(), stage.display_name().bold());
        }
        Event::StageCompleted { stage, .. } => {
            println!("  {} {}", "✓".green(), stage.display_name());
        }
        Event::StageRetrying {
            stage,
            attempt,
            max_attempts,
            wait_secs,
        } => {
            println!(
                "  {} {} rate limited, retry {}/{} in {:.0}s",
                "↻".yellow(),
                stage,
                attempt,
                max_attempts,
                wait_secs
            );
        }
        Event::WaitingForInput {
            interaction_id,
            question,
            ..
        } => {
            println!("{} {}", "?".magenta().bold(), question.bold());
            println!("  {}", interaction_id.to_string().dimmed());
        }
        Event::AlertRaised { message, .. } => {
            println!("{} {}", "ALERT".red().bold(), message);
        }
        Event::RunCompleted { .. } => {
            println!("{}", "Pipeline completed".green().bold());
        }
        Event::RunFailed { error, .. } => {
            println!("{} {}", "Pipeline failed:".red().bold(), error);
        }
    }
}

pub fn print_status(status: &SubjectStatus) {
    let label = match status.status {
        RunStatus::Running => "RUNNING".blue(),
        RunStatus::WaitingForInput => "WAITING FOR INPUT".magenta(),
        RunStatus::Completed => "COMPLETED".green(),
        RunStatus::Failed => "FAILED".red(),
    };
    println!("{}: {}", status.subject_id.cyan().bold(), label.bold());

    if let Some(pending) = &status.pending_interaction {
        println!("  question:  {}", pending.question);
        println!("  id:        {}", pending.id);
    }

    if let Some(result) = &status.result {
        let level = match result.risk_level {
            RiskLevel::Low => result.risk_level.as_str().green(),
            RiskLevel::Moderate => result.risk_level.as_str().yellow(),
            RiskLevel::High | RiskLevel::Critical => result.risk_level.as_str().red(),
            RiskLevel::Unknown => result.risk_level.as_str().dimmed(),
        };
        println!("  risk:      {} ({}/100)", level.bold(), result.risk_score);
        println!("  action:    {}", result.action);
        println!("  urgency:   {}", result.urgency);
        if result.alert_raised {
            println!("  {}", "alert raised".red().bold());
        }
    }

    if let Some(error) = &status.error {
        println!("  error:     {}", error.red());
    }
}
