//! CLI command execution.

use std::future::Future;
use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client::HttpChatClient;
use crate::config::Config;
use crate::format::format_response;
use crate::input::{Composer, InputAction};
use crate::models::Bubble;
use crate::render::{terminal_text, NoopRenderer, Renderer, TerminalRenderer};
use crate::server;
use crate::tracker::{Branding, ChatController, IgnoreReason, SendOutcome};

use super::args::{Cli, Commands, LibraryAction};

/// Apply command-line overrides on top of the loaded config.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(dir) = &cli.library_dir {
        config.library_dir = Some(dir.clone());
    }
    debug!(?config, "resolved config");
    Ok(config)
}

fn build_controller(
    config: &Config,
    save: bool,
    renderer: Arc<dyn Renderer>,
) -> Result<ChatController> {
    let client = match config.timeout() {
        Some(timeout) => HttpChatClient::with_timeout(&config.endpoint, timeout)
            .context("Failed to build HTTP client")?,
        None => HttpChatClient::new(&config.endpoint),
    };

    let mut controller = ChatController::new(Arc::new(client))
        .with_renderer(renderer)
        .with_branding(Branding::for_assistant(&config.assistant_name));
    if save {
        controller = controller.with_persister(Arc::new(config.library()?));
    }
    Ok(controller)
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let save = !cli.no_save;

    match cli.command {
        Some(Commands::Format { ref file }) => format_input(file.as_deref()),
        Some(Commands::Chat) => run_chat(&resolve_config(&cli)?, save).await,
        Some(Commands::Library { ref action }) => {
            run_library(&resolve_config(&cli)?, action).await
        }
        Some(Commands::Serve { port }) => {
            server::start_server(port, resolve_config(&cli)?.library()?).await
        }
        None => {
            let config = resolve_config(&cli)?;
            let message = cli.message.join(" ");
            if message.trim().is_empty() {
                run_chat(&config, save).await
            } else {
                send_once(&config, save, &message).await
            }
        }
    }
}

/// Send a single message, print the reply and save the exchange.
async fn send_once(config: &Config, save: bool, message: &str) -> Result<()> {
    let controller = build_controller(config, save, Arc::new(NoopRenderer))?;
    controller.initialize().await;

    let outcome = controller.send_message(message).await;
    controller.unload().await;

    match outcome {
        SendOutcome::Replied { html } => {
            println!("{}", terminal_text(&Bubble::assistant(html)));
            Ok(())
        }
        SendOutcome::Failed => bail!(
            "Could not reach the chat service at {} (run with -v for details)",
            config.endpoint
        ),
        SendOutcome::Ignored(reason) => bail!("Message was not sent: {reason:?}"),
    }
}

/// Interactive chat on stdin/stdout.
async fn run_chat(config: &Config, save: bool) -> Result<()> {
    let controller = Arc::new(build_controller(config, save, Arc::new(TerminalRenderer))?);

    println!("Chatting with {} at {}", config.assistant_name, config.endpoint);
    println!("Enter sends. End a line with \\ to continue it. /new or Ctrl+K starts a new thread, /quit leaves.");
    controller.initialize().await;

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    chat_loop(controller, spawn_stdin_reader(), interrupted).await
}

/// Read stdin on its own thread; a blocked read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Drive the controller from input lines until EOF, `/quit` or `shutdown`.
///
/// Sends run as tasks so input (and the shutdown signal) keep being handled
/// while a reply is pending. On EOF or `/quit` pending replies are awaited;
/// `shutdown` abandons them. Either way the thread is unloaded before
/// returning.
async fn chat_loop(
    controller: Arc<ChatController>,
    mut input: mpsc::Receiver<std::io::Result<String>>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut composer = Composer::default();
    let mut sends = JoinSet::new();
    let mut interrupted = false;

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    spawn_send(&mut sends, &controller, composer.take());
                    break;
                };
                let line = line.context("Failed to read input")?;
                match composer.feed(&line) {
                    Some(InputAction::Send(text)) => spawn_send(&mut sends, &controller, text),
                    Some(InputAction::NewThread) => {
                        controller.start_new_thread().await;
                    }
                    Some(InputAction::Quit) => break,
                    None => {}
                }
            }
            Some(joined) = sends.join_next(), if !sends.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "send task failed");
                }
            }
            () = &mut shutdown => {
                println!();
                interrupted = true;
                break;
            }
        }
    }

    if !interrupted {
        tokio::select! {
            () = async { while sends.join_next().await.is_some() {} } => {}
            () = &mut shutdown => println!(),
        }
    }

    if controller.unload().await {
        info!("saved transcript on exit");
    }
    Ok(())
}

fn spawn_send(sends: &mut JoinSet<()>, controller: &Arc<ChatController>, text: String) {
    if text.trim().is_empty() {
        return;
    }
    let controller = Arc::clone(controller);
    sends.spawn(async move {
        if let SendOutcome::Ignored(IgnoreReason::Busy) = controller.send_message(&text).await {
            println!("(still waiting for the previous reply, message not sent)");
        }
    });
}

fn format_input(file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };
    println!("{}", format_response(&text));
    Ok(())
}

async fn run_library(config: &Config, action: &LibraryAction) -> Result<()> {
    let library = config.library()?;

    match action {
        LibraryAction::List => {
            let chats = library.list().await?;
            if chats.is_empty() {
                println!("No saved chats in {}.", library.dir().display());
                return Ok(());
            }

            println!("{:<38} {:<17} {}", "ID", "SAVED", "TITLE");
            println!("{}", "-".repeat(80));

            for chat in chats {
                let title: String = chat.title.chars().take(40).collect();
                println!(
                    "{:<38} {:<17} {}",
                    chat.id,
                    chat.saved_at.format("%Y-%m-%d %H:%M"),
                    title.replace('\n', " "),
                );
            }
        }
        LibraryAction::Show { id } => {
            let chat = library.load(id).await?;
            println!("{}", chat.title);
            println!("Saved: {}", chat.saved_at.format("%Y-%m-%d %H:%M:%S"));
            println!();
            println!("{}", chat.content);
        }
    }
    Ok(())
}
