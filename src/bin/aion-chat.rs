//! Interactive chat client for the AION core.
//!
//! This binary provides a streaming REPL: each message is sent with the whole
//! conversation to the configured backend and the reply is printed as it
//! streams in.
//!
//! # Usage
//!
//! ```bash
//! # Local backend on http://localhost:8000 with the local model
//! aion-chat
//!
//! # Remote backend; the cloud model is selected by default
//! aion-chat --api-url https://aion.example.com
//!
//! # Disable colors (useful for piping output)
//! aion-chat --no-color
//! ```
//!
//! `AION_API_URL` is used when `--api-url` is not given, and `RUST_LOG`
//! controls log output on stderr.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/provider <name>` - Switch between local-model and cloud-model
//! - `/health` - Check the backend
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use aion::Provider;
use aion::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, TerminalRenderer, help_text, parse_command,
};
use aion::render::{format_error, format_info};

/// Main entry point for the aion-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("aion-chat [OPTIONS]");
    let config = ChatConfig::from(args).with_env_fallback();
    let use_color = config.use_color;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    let mut session = ChatSession::new(&config)?.with_interrupt(Arc::clone(&interrupted));
    session.subscribe(Box::new(TerminalRenderer::new(use_color)));
    let mut rl = DefaultEditor::new()?;

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!(
        "AION Chat (provider: {}, endpoint: {})",
        session.provider().label(),
        session.selector().endpoint_label()
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                if let Some(cmd) = parse_command(trimmed) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Provider(None) => {
                            let provider = session.provider();
                            println!(
                                "{}",
                                format_info(
                                    &format!("Provider: {} ({})", provider, provider.label()),
                                    use_color
                                )
                            );
                        }
                        ChatCommand::Provider(Some(name)) => match session.set_provider(&name) {
                            Ok(provider) => println!(
                                "{}",
                                format_info(
                                    &format!("Provider changed to: {}", provider.label()),
                                    use_color
                                )
                            ),
                            Err(err) => println!("{}", format_error(&err.to_string(), use_color)),
                        },
                        ChatCommand::Providers => print_providers(session.provider()),
                        ChatCommand::Health => match session.health().await {
                            Ok(status) => {
                                let service = status.service.as_deref().unwrap_or("unknown");
                                let message = format!("{service}: {}", status.status);
                                if status.is_ok() {
                                    println!("{}", format_info(&message, use_color));
                                } else {
                                    println!("{}", format_error(&message, use_color));
                                }
                            }
                            Err(err) => println!("{}", format_error(&err.to_string(), use_color)),
                        },
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::Invalid(message) => {
                            println!("{}", format_error(&message, use_color));
                        }
                    }
                    continue;
                }

                println!("AION:");
                // Submitted untrimmed.
                if let Err(e) = session.submit(&line).await {
                    println!("{}", format_error(&e.to_string(), use_color));
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                println!("{}", format_error(&format!("Input error: {}", err), use_color));
                break;
            }
        }
    }

    Ok(())
}

fn print_providers(active: Provider) {
    println!("    Providers:");
    for provider in Provider::ALL {
        let marker = if provider == active { "*" } else { " " };
        println!(
            "    {marker} {:<12} {:<16} model {}",
            provider.name(),
            provider.label(),
            provider.model_identifier()
        );
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Provider: {} ({})", stats.provider, stats.provider.label());
    println!("      Model: {}", stats.model);
    println!("      Endpoint: {}", stats.endpoint);
    println!(
        "      Messages: {} ({} user / {} assistant)",
        stats.message_count, stats.user_messages, stats.assistant_messages
    );
    println!(
        "      Requests: {} ({} completed / {} failed)",
        stats.total_requests, stats.completed, stats.failed
    );
    println!(
        "      Received: {} bytes in {} chunks",
        stats.bytes_received, stats.chunks_received
    );
    match stats.last_elapsed {
        Some(elapsed) => println!("      Last reply: {:.2}s", elapsed.as_secs_f64()),
        None => println!("      Last reply: (none)"),
    }
}
