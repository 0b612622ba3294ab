//! Interactive chat loop.

use crate::print_citations;
use anyhow::{Context, Result};
use colored::Colorize;
use devsavvy_core::history::ConversationStore;
use devsavvy_core::{check_ollama_silent, ChatManager, Config};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
/attach <path>     attach a file or directory
/detach <n>        remove source n
/files             list attached sources
/source-only       toggle answering only from sources
/clear             start a new conversation (keeps files)
/save              save the conversation
/exit              quit";

/// What the loop should do after a line is handled.
enum Flow {
    Continue,
    Exit,
}

pub async fn run(config: Config, files: &[PathBuf], source_only: bool, resume: Option<String>) -> Result<()> {
    let store = ConversationStore::new(&config.storage.chat_history_path);

    if let Err(e) = check_ollama_silent(&config.llm.base_url).await {
        eprintln!("{} {}", "warning:".yellow().bold(), e);
        if config.chat.demo_fallback {
            eprintln!("{}", "Replies will be demo placeholders until Ollama is running.".dimmed());
        }
    }

    let mut manager = ChatManager::new(config);
    if let Some(id) = resume {
        let conversation = store.load(&id).await.context("Failed to resume conversation")?;
        println!("{} {}", "Resuming".dimmed(), conversation.title.bold());
        manager = manager.with_conversation(conversation);
    }
    for file in files {
        manager.attach_path(file).await?;
    }
    if source_only {
        manager.set_source_only(true);
    }

    println!(
        "{} {} (type {} for commands)",
        "DevSavvy chat with".bold(),
        manager.config().llm.model.cyan(),
        "/help".cyan()
    );
    print_files(&manager);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let flow = if line.starts_with('/') {
            command(&mut manager, &store, line).await
        } else {
            ask(&mut manager, line).await
        };

        match flow {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(e) => eprintln!("{} {:#}", "error:".red().bold(), e),
        }
    }

    Ok(())
}

async fn ask(manager: &mut ChatManager, message: &str) -> Result<Flow> {
    let reply = manager
        .query_stream(message, |chunk| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();
    print_citations(&reply);
    println!();
    Ok(Flow::Continue)
}

async fn command(manager: &mut ChatManager, store: &ConversationStore, line: &str) -> Result<Flow> {
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    debug!(command = name, "REPL command");

    match name {
        "/exit" | "/quit" => return Ok(Flow::Exit),
        "/help" => println!("{}", HELP),
        "/attach" => {
            if arg.is_empty() {
                println!("Usage: /attach <path>");
            } else {
                let path = PathBuf::from(arg);
                if path.is_dir() {
                    let added = manager.attach_directory(&path).await?;
                    println!("{} Attached {} files", "✓".green().bold(), added);
                } else if manager.attach_path(&path).await? {
                    println!("{} Attached {}", "✓".green().bold(), path.display());
                } else {
                    println!("{}", "Already attached".yellow());
                }
            }
        }
        "/detach" => match arg.parse::<usize>().ok().and_then(|n| manager.detach(n)) {
            Some(file) => println!("{} Detached {}", "✓".green().bold(), file.name),
            None => println!("Usage: /detach <n> (see /files)"),
        },
        "/files" => print_files(manager),
        "/source-only" => {
            let enabled = !manager.source_only();
            manager.set_source_only(enabled);
            println!("Source-only mode {}", if enabled { "on".green() } else { "off".yellow() });
        }
        "/clear" => {
            manager.clear_history();
            println!("{} Conversation cleared", "✓".green().bold());
        }
        "/save" => {
            if manager.conversation().messages.is_empty() {
                println!("{}", "Nothing to save yet".yellow());
            } else {
                let path = store.save(manager.conversation()).await?;
                println!("{} Saved to {}", "✓".green().bold(), path.display());
            }
        }
        other => println!("Unknown command {} (try /help)", other),
    }

    Ok(Flow::Continue)
}

fn print_files(manager: &ChatManager) {
    let files = manager.attachments();
    if files.is_empty() {
        return;
    }

    println!("{}", "Sources:".bold());
    for (i, file) in files.iter().enumerate() {
        let note = if file.truncated { " (truncated)" } else { "" };
        println!("  [{}] {} {}{}", i + 1, file.name.cyan(), file.kind.label().dimmed(), note);
    }
}
