use super::open_store;
use crate::output;
use color_eyre::eyre::{eyre, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;
use vf_core::agents::adapters::MockAgent;
use vf_core::agents::manager::AgentManager;
use vf_core::config::{load_config, load_patient};
use vf_core::engine::PipelineEngine;
use vf_core::interaction::InteractionGateway;
use vf_core::notify::{AlertSink, LogAlertSink, Notifier, WebhookAlertSink};
use vf_core::retry::{RetryPolicy, RetryingInvoker};
use vf_core::state::PipelineRunner;
use vf_protocol::ipc::Event;
use vf_protocol::run_models::RunStatus;

const EVENT_BUFFER: usize = 256;

pub struct RunArgs {
    pub patient: PathBuf,
    pub subject: Option<String>,
    pub interactive: bool,
    pub database: Option<String>,
}

pub async fn execute(root: &Path, args: RunArgs) -> Result<()> {
    let config = load_config(root).await?;
    let patient = load_patient(&args.patient)?;
    let subject = match args.subject {
        Some(subject) => subject,
        None => args
            .patient
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| eyre!("Cannot derive a subject id from {}", args.patient.display()))?,
    };

    let database = args
        .database
        .clone()
        .unwrap_or_else(|| config.settings.database.url.clone());
    let store = Arc::new(open_store(root, Some(&database)).await?);

    let (notifier, mut events) = Notifier::channel(EVENT_BUFFER);

    let mut manager = if config.agents.is_empty() {
        AgentManager::builtin()
    } else {
        AgentManager::new(config.agents.clone())
    };
    for stage in manager.missing_stages() {
        tracing::info!(stage = %stage, "No agent configured; using the scripted agent");
        manager = manager.with_agent(stage, Arc::new(MockAgent::for_stage(stage)));
    }

    let invoker = RetryingInvoker::new(RetryPolicy::from_settings(&config.settings.retry))
        .with_notifier(notifier.clone());
    let gateway = InteractionGateway::from_settings(
        store,
        notifier.clone(),
        &config.settings.interaction,
        args.interactive,
    );

    let alert_sink: Arc<dyn AlertSink> = match &config.settings.alerts.webhook_url {
        Some(url) => Arc::new(WebhookAlertSink::new(url.clone())),
        None => Arc::new(LogAlertSink),
    };

    let engine =
        PipelineEngine::new(manager, invoker, gateway).with_instructions(&config.agents);
    let runner = PipelineRunner::new(engine, notifier)
        .with_score_threshold(config.settings.alerts.score_threshold)
        .with_alert_sink(alert_sink);

    println!(
        "{} pipeline for {} ({})",
        "Starting".green().bold(),
        subject.cyan(),
        patient.name
    );

    let handle = runner
        .start_run(subject.clone(), patient)
        .await
        .map_err(|e| eyre!("{e:#}"))?;
    let mut finished = Box::pin(handle.wait());
    let mut answers = args.interactive.then(spawn_stdin_reader);
    let mut awaiting: Option<Uuid> = None;

    let run = loop {
        tokio::select! {
            run = &mut finished => break run.map_err(|e| eyre!("{e:#}"))?,
            Some(event) = events.recv() => {
                output::print_event(&event);

                if let Event::WaitingForInput { interaction_id, .. } = event {
                    if args.interactive {
                        print!("{} ", ">".bold());
                        let _ = std::io::Write::flush(&mut std::io::stdout());
                        awaiting = Some(interaction_id);
                    } else {
                        println!(
                            "  answer with: vitalflow answer {} \"<text>\"",
                            interaction_id
                        );
                    }
                }
            }
            Some(line) = next_line(&mut answers), if awaiting.is_some() => {
                let answer = line.trim();
                if answer.is_empty() {
                    continue;
                }
                if let Some(interaction_id) = awaiting.take() {
                    if let Err(e) = runner.submit_answer(interaction_id, answer).await {
                        println!("{} {}", "Answer not recorded:".yellow(), e);
                    }
                }
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        output::print_event(&event);
    }

    match run.status {
        RunStatus::Completed => {
            if let Some(status) = runner.status(&subject).await? {
                output::print_status(&status);
            }
            Ok(())
        }
        _ => Err(eyre!(
            "Pipeline failed: {}",
            run.error.unwrap_or_else(|| "unknown error".to_string())
        )),
    }
}

/// Forward stdin lines from a plain thread, so a pending read never holds up
/// runtime shutdown and events keep printing while the subject types.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn next_line(answers: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match answers {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
