use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use vigil_application::{SessionUseCase, TurnReport};
use vigil_core::session::{EventBus, Message, MessageType, SessionPhase};
use vigil_core::workflow::template::template_ids;
use vigil_infrastructure::{logging, settings, TomlContextStore};

mod demo;

/// CLI helper for rustyline that provides completion, highlighting, and
/// hints for slash commands.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/status".to_string(),
                "/suggest".to_string(),
                "/workflow".to_string(),
                "/cancel".to_string(),
                "/sessions".to_string(),
                "/ack".to_string(),
                "/help".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn render_message(message: &Message) {
    match message.message_type {
        MessageType::UserInput => {}
        MessageType::AssistantResponse => {
            for line in message.content.lines() {
                println!("{}", line.bright_blue());
            }
        }
        MessageType::CommandExecution => {
            println!("{}", message.content.green());
            if let Some(execution) = &message.execution {
                println!("{}", format!("  ({} ms)", execution.elapsed_ms).bright_black());
            }
        }
        MessageType::ConfirmationRequest => {
            println!("{}", message.content.bright_yellow());
        }
        MessageType::ErrorMessage => {
            println!("{}", message.content.red());
        }
        MessageType::SystemMessage | MessageType::Suggestion => {
            println!("{}", message.content.bright_black());
        }
    }
}

fn render_report(report: &TurnReport) {
    for message in &report.messages {
        render_message(message);
    }
    if report.phase == SessionPhase::Idle && !report.suggestions.is_empty() {
        for suggestion in &report.suggestions {
            println!("{}", format!("hint: {}", suggestion.content).bright_black());
        }
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_magenta());
    println!("  /status                     show session phase and counters");
    println!("  /suggest                    show suggestions for the next action");
    println!("  /workflow list              list available workflows");
    println!("  /workflow start <id>        start a workflow");
    println!("  /workflow next [note]       complete the current step");
    println!("  /workflow skip              skip the current step");
    println!("  /workflow abandon           abandon the active workflow");
    println!("  /cancel                     cancel a pending confirmation");
    println!("  /sessions                   list live sessions");
    println!("  /ack                        acknowledge an error");
    println!("  quit                        exit");
    println!(
        "{}",
        format!("Known verbs: {}", demo::known_verbs().join(", ")).bright_black()
    );
}

async fn show_status(engine: &SessionUseCase, session_id: &str) -> Result<()> {
    let snapshot = engine.snapshot(session_id).await?;
    println!("{}", format!("session  {}", snapshot.session_id).bright_black());
    println!("phase    {}", snapshot.phase.to_string().bright_cyan());
    if let Some((prompt, remaining)) = &snapshot.pending_confirmation {
        println!(
            "pending  {} ({} ms left)",
            prompt.bright_yellow(),
            remaining
        );
    }
    if let Some(topic) = &snapshot.current_topic {
        println!("topic    {}", topic);
    }
    if let Some((name, step, total)) = &snapshot.workflow {
        println!("workflow {} (step {}/{})", name, step + 1, total);
    }
    println!(
        "turns    {}   errors {}",
        snapshot.total_interactions, snapshot.error_count
    );
    Ok(())
}

async fn handle_workflow_command(
    engine: &SessionUseCase,
    session_id: &str,
    args: &[&str],
) -> Result<()> {
    match args {
        ["list"] | [] => {
            println!("{}", "Available workflows:".bright_magenta());
            for id in template_ids() {
                println!("  {}", id);
            }
        }
        ["start", template_id] => {
            let workflow = engine.start_workflow(session_id, template_id).await?;
            println!(
                "{}",
                format!(
                    "Started '{}' ({} steps, ~{} min)",
                    workflow.name,
                    workflow.total_steps,
                    workflow.estimated_duration_min.unwrap_or(0)
                )
                .green()
            );
            if let Some(step) = workflow.current() {
                println!("{}", format!("Step 1: {} - {}", step.name, step.description).yellow());
            }
        }
        ["next", note @ ..] => {
            let result = if note.is_empty() {
                serde_json::json!("done")
            } else {
                serde_json::json!(note.join(" "))
            };
            let advance = engine.advance_workflow_step(session_id, result).await?;
            report_advance(engine, session_id, advance).await?;
        }
        ["skip"] => {
            let advance = engine.skip_workflow_step(session_id).await?;
            report_advance(engine, session_id, advance).await?;
        }
        ["abandon"] => {
            let workflow = engine.abandon_workflow(session_id).await?;
            println!(
                "{}",
                format!(
                    "Abandoned '{}' at step {}/{}",
                    workflow.name,
                    workflow.current_step + 1,
                    workflow.total_steps
                )
                .yellow()
            );
        }
        _ => println!("{}", "Usage: /workflow list|start <id>|next [note]|skip|abandon".red()),
    }
    Ok(())
}

async fn report_advance(
    engine: &SessionUseCase,
    session_id: &str,
    advance: vigil_core::workflow::StepAdvance,
) -> Result<()> {
    if advance.finished {
        println!("{}", format!("Workflow '{}' finished.", advance.workflow_id).green());
        return Ok(());
    }
    let snapshot = engine.snapshot(session_id).await?;
    if let Some((name, step, total)) = snapshot.workflow {
        println!("{}", format!("'{}': step {}/{}", name, step + 1, total).yellow());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("vigil=info");

    let config = settings::load_default()?;
    let store = Arc::new(TomlContextStore::default_location()?);
    let engine = SessionUseCase::new(
        store,
        Arc::new(demo::KeywordClassifier),
        Arc::new(demo::DemoExecutor),
        EventBus::default(),
        config,
    );

    let session_id = engine.open_session(None, None).await?;

    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Vigil ===".bright_magenta().bold());
    println!(
        "{}",
        "Describe what you want to do, '/help' for commands, 'quit' to exit.".bright_black()
    );
    println!();

    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                let outcome = if let Some(rest) = trimmed.strip_prefix('/') {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    match parts.split_first() {
                        Some((&"help", _)) => {
                            print_help();
                            Ok(())
                        }
                        Some((&"status", _)) => show_status(&engine, &session_id).await,
                        Some((&"suggest", _)) => match engine.suggestions(&session_id).await {
                            Err(err) => Err(err.into()),
                            Ok(suggestions) if suggestions.is_empty() => {
                                println!("{}", "Nothing to suggest yet.".bright_black());
                                Ok(())
                            }
                            Ok(suggestions) => {
                                for suggestion in suggestions {
                                    println!("{}", suggestion.content.bright_blue());
                                    println!(
                                        "{}",
                                        format!(
                                            "  {} (confidence {:.2})",
                                            suggestion.reasoning, suggestion.confidence
                                        )
                                        .bright_black()
                                    );
                                }
                                Ok(())
                            }
                        },
                        Some((&"workflow", args)) => {
                            handle_workflow_command(&engine, &session_id, args).await
                        }
                        Some((&"sessions", _)) => {
                            for id in engine.session_ids().await {
                                if id == session_id {
                                    println!("{} {}", "*".bright_green(), id);
                                } else {
                                    println!("  {}", id);
                                }
                            }
                            Ok(())
                        }
                        Some((&"cancel", _)) => engine
                            .cancel_pending(&session_id)
                            .await
                            .map(|report| render_report(&report))
                            .map_err(Into::into),
                        Some((&"ack", _)) => engine
                            .acknowledge_error(&session_id)
                            .await
                            .map_err(Into::into),
                        _ => {
                            println!("{}", "Unknown command; try /help.".red());
                            Ok(())
                        }
                    }
                } else {
                    engine
                        .handle_input(&session_id, trimmed)
                        .await
                        .map(|report| render_report(&report))
                        .map_err(Into::into)
                };

                if let Err(err) = outcome {
                    eprintln!("{}", format!("Error: {}", err).red());
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}
