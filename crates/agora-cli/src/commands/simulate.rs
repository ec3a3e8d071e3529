//! Simulate command - run an all-agent debate in process
//!
//! Usage:
//! ```bash
//! agora simulate "Homework should be abolished"
//! agora simulate "Nuclear power is essential" --order government,opposition,crossbench
//! agora simulate "Homework should be abolished" --json
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use agora_core::{FinalResult, ParticipantKind, Phase, Role};
use agora_llm::LlmConfig;
use agora_persist::{KvSessionStore, MemoryBackend};
use agora_runtime::{ChannelBroadcaster, DebateEvent, DebateOrchestrator, NewSession, RuntimeConfig};

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// The motion to debate
    #[arg(default_value = "This house believes social media does more harm than good")]
    motion: String,

    /// Speaking order as comma-separated roles
    #[arg(long, value_delimiter = ',', default_value = "proposition,opposition")]
    order: Vec<String>,

    /// Pause before each agent speech, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Print the final result as JSON instead of a table
    #[arg(long)]
    json: bool,
}

/// Run the simulate command
pub async fn run(args: SimulateArgs) -> Result<()> {
    let llm = LlmConfig::from_env().context("Invalid LLM configuration")?;
    let mut runtime = RuntimeConfig::from_env().context("Invalid runtime configuration")?;
    runtime.agent_delay_min = Duration::from_millis(args.delay_ms);
    runtime.agent_delay_max = Duration::from_millis(args.delay_ms);

    let provider = llm.build_provider();
    let events = Arc::new(ChannelBroadcaster::new(runtime.event_capacity));
    let orchestrator = DebateOrchestrator::new(
        Arc::new(KvSessionStore::new(Arc::new(MemoryBackend::new()))),
        events.clone(),
        llm.build_generator(provider.clone()),
        llm.build_scorer(provider),
        runtime,
    );

    let order: Vec<Role> = args.order.iter().map(|r| Role::new(r)).collect();
    let session = orchestrator
        .create_session(NewSession::new(&args.motion).with_speaking_order(order))
        .await?;
    let mut rx = events.subscribe(session.id);

    for role in &session.speaking_order {
        orchestrator
            .join(session.id, &format!("agent-{}", role), role, ParticipantKind::Agent)
            .await?;
    }

    if !args.json {
        println!("{}", "Agora debate simulation".bold().cyan());
        println!("{}", "═".repeat(50).cyan());
        println!("{} {}", "Motion:".bold(), session.motion);
        println!();
    }

    // Skip the preparation clock: agents need no time to prepare
    orchestrator.request_phase(session.id, Phase::Preparation).await?;
    orchestrator.request_phase(session.id, Phase::Debate).await?;

    let result = tokio::time::timeout(Duration::from_secs(args.timeout_secs), async {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if let DebateEvent::DebateCompleted { final_result, .. } = envelope.event {
                        return Ok(final_result);
                    }
                    if !args.json {
                        print_event(&envelope.event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Simulation output fell behind");
                }
                Err(RecvError::Closed) => bail!("Event stream closed before the debate completed"),
            }
        }
    })
    .await
    .context("Simulation timed out")??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_event(event: &DebateEvent) {
    match event {
        DebateEvent::PhaseChanged { phase, .. } => {
            crate::print_info(&format!("Phase: {}", phase));
        }
        DebateEvent::SpeakerChanged {
            role,
            speech_number,
            total_speeches,
            ..
        } => {
            println!();
            println!(
                "{} {} ({}/{})",
                "▶".cyan(),
                role.to_string().bold(),
                speech_number,
                total_speeches
            );
        }
        DebateEvent::NewMessage {
            speaker_id, content, ..
        } => {
            println!("{} {}", format!("{}:", speaker_id).green(), content);
        }
        DebateEvent::Feedback { score, tags, .. } => {
            let tags = if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(", "))
            };
            println!("  {} {:.1}/10{}", "score".dimmed(), score, tags.dimmed());
        }
        DebateEvent::Error { reason, .. } => crate::print_error(reason),
        _ => {}
    }
}

fn print_result(result: &FinalResult) {
    println!();
    println!("{}", "Final ranking".bold());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Rank").fg(Color::Cyan),
            Cell::new("Participant").fg(Color::Cyan),
            Cell::new("Role").fg(Color::Cyan),
            Cell::new("Speeches").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
            Cell::new("Grade").fg(Color::Cyan),
            Cell::new("Badges").fg(Color::Cyan),
        ]);

    for row in &result.participants {
        let badges: Vec<String> = row.badges.iter().map(|b| format!("{:?}", b)).collect();
        table.add_row(vec![
            Cell::new(row.rank),
            Cell::new(&row.participant_id).fg(Color::Green),
            Cell::new(row.role.as_str()),
            Cell::new(row.message_count),
            Cell::new(format!("{:.2}", row.final_score)),
            Cell::new(row.grade.to_string()),
            Cell::new(badges.join(", ")),
        ]);
    }

    println!("{table}");
    println!("{}", result.headline().bold());
}
