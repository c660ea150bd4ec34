//! Provider Inbox CLI
//!
//! Operator tool over the messaging core: list conversations, read and send in
//! a thread, or watch both views update live.

use anyhow::Context;
use clap::{Parser, Subcommand};
use provider_inbox::config::Config;
use provider_inbox::models::{Conversation, Message};
use provider_inbox::send::SendOutcome;
use provider_inbox::{Inbox, Result};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Provider Inbox - dashboard messaging from the terminal
#[derive(Parser)]
#[command(name = "provider-inbox")]
#[command(about = "Read and send provider dashboard messages")]
struct Cli {
    /// Backend base URL (overrides PROVIDER_INBOX_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session file holding the bearer token
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations, most recent first
    Conversations,

    /// Show the messages of a conversation
    Thread {
        /// Conversation id
        conversation: String,
    },

    /// Send a message to a conversation
    Send {
        /// Conversation id
        conversation: String,

        /// Message text
        #[arg(num_args = 1.., trailing_var_arg = true)]
        content: Vec<String>,
    },

    /// Keep polling and log changes until Ctrl-C
    Watch {
        /// Also follow this conversation's thread
        #[arg(long)]
        conversation: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::from_env().context("reading PROVIDER_INBOX_* settings")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    let inbox = Inbox::from_config(&config);

    let result = match cli.command {
        Commands::Conversations => cmd_conversations(&inbox).await,
        Commands::Thread { conversation } => cmd_thread(&config, &inbox, &conversation).await,
        Commands::Send {
            conversation,
            content,
        } => cmd_send(&config, &inbox, &conversation, &content.join(" ")).await,
        Commands::Watch { conversation } => {
            cmd_watch(&config, &inbox, conversation.as_deref()).await
        }
    };

    inbox.shutdown().await;

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_conversations(inbox: &Inbox) -> Result<()> {
    inbox.conversations().refresh_now().await;
    let conversations = inbox.list_conversations().await;

    if conversations.is_empty() {
        println!("No conversations");
        return Ok(());
    }

    let user = inbox.current_user_id();
    for conversation in conversations {
        println!("{}", format_conversation(&conversation, user.as_deref()));
    }
    Ok(())
}

async fn cmd_thread(config: &Config, inbox: &Inbox, conversation_id: &str) -> Result<()> {
    if !inbox.selection().select_id(conversation_id).await {
        println!(
            "Not signed in (no session token at {})",
            config.session_file.display()
        );
        return Ok(());
    }
    print_thread(inbox).await;
    Ok(())
}

async fn cmd_send(
    config: &Config,
    inbox: &Inbox,
    conversation_id: &str,
    content: &str,
) -> Result<()> {
    inbox.selection().select_id(conversation_id).await;

    match inbox.send(conversation_id, content).await? {
        SendOutcome::Sent(message) => {
            println!("Sent {}", message.id);
            print_thread(inbox).await;
        }
        SendOutcome::Unauthenticated => {
            println!(
                "Not signed in (no session token at {})",
                config.session_file.display()
            );
        }
    }
    Ok(())
}

async fn cmd_watch(
    config: &Config,
    inbox: &Inbox,
    conversation_id: Option<&str>,
) -> Result<()> {
    if !inbox.conversations().start().await {
        println!(
            "Not signed in (no session token at {})",
            config.session_file.display()
        );
        return Ok(());
    }
    if let Some(id) = conversation_id {
        inbox.selection().select_id(id).await;
    }

    let mut conversations_rx = inbox.conversation_store().read().await.subscribe();
    let mut thread_rx = inbox.thread_store().read().await.subscribe();
    info!("Watching for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
            changed = conversations_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = inbox.conversation_store().read().await.len();
                info!(count, "Conversation list changed");
            }
            changed = thread_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(latest) = inbox.thread().await.last() {
                    info!(
                        message_id = %latest.1.id,
                        status = %latest.1.status,
                        "Thread changed: {}",
                        preview(&latest.1.content)
                    );
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

async fn print_thread(inbox: &Inbox) {
    let thread = inbox.thread().await;
    if thread.is_empty() {
        println!("No messages yet");
        return;
    }
    for (mine, message) in thread {
        println!("{}", format_message(mine, &message));
    }
}

fn format_conversation(conversation: &Conversation, user_id: Option<&str>) -> String {
    let names: Vec<&str> = conversation
        .others(user_id)
        .map(|p| p.display_name.as_str())
        .collect();

    match &conversation.last_message_summary {
        Some(summary) => format!(
            "{}  {}  [{}] {}",
            conversation.id,
            names.join(", "),
            summary.timestamp.format("%Y-%m-%d %H:%M"),
            preview(&summary.content)
        ),
        None => format!("{}  {}", conversation.id, names.join(", ")),
    }
}

fn format_message(mine: bool, message: &Message) -> String {
    let who = if mine { "me" } else { message.sender_id.as_str() };
    format!(
        "[{}] {:>10}: {} ({})",
        message.timestamp.format("%H:%M:%S"),
        who,
        message.content,
        message.status
    )
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(50).collect();
    if short.len() < text.len() {
        format!("{}...", short)
    } else {
        short
    }
}
