mod repl;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use devsavvy_core::canvas::{CanvasState, NodeKind, Position};
use devsavvy_core::history::ConversationStore;
use devsavvy_core::templates::TemplateLibrary;
use devsavvy_core::{ChatManager, ChatReply, Config, OllamaProvider, Provider, Server};
use devsavvy_files::{build_context, FileProcessor};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devsavvy")]
#[command(about = "Chat with local models about your files", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Ask a single question, optionally about files")]
    Ask {
        message: String,

        #[arg(short, long = "file", help = "File to use as a source (repeatable)")]
        files: Vec<PathBuf>,

        #[arg(short, long = "dir", help = "Directory whose files become sources")]
        dirs: Vec<PathBuf>,

        #[arg(long, help = "Answer only from the provided files")]
        source_only: bool,

        #[arg(long, help = "Save the exchange to history")]
        save: bool,
    },

    #[command(about = "Start an interactive chat")]
    Chat {
        #[arg(short, long = "file", help = "File to use as a source (repeatable)")]
        files: Vec<PathBuf>,

        #[arg(long, help = "Answer only from the provided files")]
        source_only: bool,

        #[arg(long, help = "Continue a saved conversation (id or prefix)")]
        resume: Option<String>,
    },

    #[command(about = "Print the context block extracted from files")]
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    #[command(about = "Saved conversations")]
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    #[command(about = "Document templates")]
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    #[command(about = "Canvas boards")]
    Canvas {
        #[command(subcommand)]
        command: CanvasCommands,
    },

    #[command(about = "Serve the engine on a Unix socket")]
    Serve,
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current model")]
    Show,

    #[command(about = "Set the LLM model")]
    Set {
        #[arg(help = "Model name (e.g., 'llama3.2:3b' or 'llava:7b')")]
        model: String,
    },

    #[command(about = "List available models from Ollama")]
    List {
        #[arg(short, long, help = "Ollama URL (defaults to the configured one)")]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    #[command(about = "List saved conversations")]
    List,

    #[command(about = "Print a conversation")]
    Show { id: String },

    #[command(about = "Delete a conversation")]
    Delete { id: String },
}

#[derive(Subcommand)]
enum TemplateCommands {
    #[command(about = "List templates")]
    List,

    #[command(about = "Show a template and its variables")]
    Show { id: String },

    #[command(about = "Render a template")]
    Generate {
        id: String,

        #[arg(long = "var", value_name = "KEY=VALUE", help = "Placeholder value (repeatable)")]
        vars: Vec<String>,

        #[arg(short, long, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CanvasCommands {
    #[command(about = "Start an empty board")]
    New,

    #[command(about = "Show nodes and edges")]
    Show,

    #[command(about = "Add a node")]
    Add {
        content: String,

        #[arg(long, help = "Mark the node as code in this language")]
        code: Option<String>,

        #[arg(long, default_value_t = 0.0)]
        x: f64,

        #[arg(long, default_value_t = 0.0)]
        y: f64,
    },

    #[command(about = "Connect two nodes")]
    Connect {
        source: String,
        target: String,

        #[arg(long)]
        label: Option<String>,
    },

    #[command(about = "Undo the last change")]
    Undo,

    #[command(about = "Redo the last undone change")]
    Redo,

    #[command(about = "Save the board as a named snapshot")]
    Snapshot { name: String },

    #[command(about = "Restore a named snapshot")]
    Restore { name: String },

    #[command(about = "Print a share link for the board")]
    Share {
        #[arg(long, default_value = "https://devsavvy.app/canvas")]
        base: String,
    },

    #[command(about = "Replace the board with one from a share link")]
    Import { link: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
            ModelCommands::List { url } => list_models(&cli.config, url).await,
        },
        Commands::Ask {
            message,
            files,
            dirs,
            source_only,
            save,
        } => ask(&cli.config, &message, &files, &dirs, source_only, save).await,
        Commands::Chat {
            files,
            source_only,
            resume,
        } => repl::run(load_config(&cli.config)?, &files, source_only, resume).await,
        Commands::Extract { files } => extract(&cli.config, &files).await,
        Commands::History { command } => history(&cli.config, command).await,
        Commands::Template { command } => template(command),
        Commands::Canvas { command } => canvas(&cli.config, command).await,
        Commands::Serve => serve(&cli.config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "devsavvy=debug,devsavvy_core=debug,devsavvy_files=debug"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file, falling back to defaults when it does not exist.
fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Ok(Config::default());
    }
    Config::load(config_path).with_context(|| format!("Failed to load config {}", config_path.display()))
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Context Length: {}", config.llm.context_length);
    println!();
    println!("{}", "Files:".bold());
    println!("  Max File Size:   {} bytes", config.files.max_file_bytes);
    println!("  Max File Chars:  {}", config.files.max_file_chars);
    println!();
    println!("{}", "Chat:".bold());
    println!("  Source Only:     {}", config.chat.source_only);
    println!("  Demo Fallback:   {}", config.chat.demo_fallback);
    println!("  Max History:     {}", config.chat.max_history);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Chat History:    {}", config.storage.chat_history_path);
    println!("  Canvas:          {}", config.storage.canvas_path);
    println!("  Socket:          {}", config.storage.socket_path);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}: {}", "Current model".bold(), config.llm.model.cyan());
    Ok(())
}

/// Updates only `llm.model`, leaving the rest of the file as written.
fn set_model(config_path: &Path, model: &str) -> Result<()> {
    if !config_path.exists() {
        let mut config = Config::default();
        config.llm.model = model.to_string();
        config.save(config_path).context("Failed to write config file")?;
    } else {
        let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let mut config: serde_yaml::Value = serde_yaml::from_str(&content).context("Failed to parse config")?;

        let Some(root) = config.as_mapping_mut() else {
            bail!("Config file is not a YAML mapping");
        };
        let llm = root
            .entry(serde_yaml::Value::String("llm".to_string()))
            .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));

        match llm.as_mapping_mut() {
            Some(llm_map) => {
                llm_map.insert(
                    serde_yaml::Value::String("model".to_string()),
                    serde_yaml::Value::String(model.to_string()),
                );
            }
            None => bail!("`llm` in config file is not a mapping"),
        }

        let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;

        std::fs::write(config_path, updated_content).context("Failed to write config file")?;
    }

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());

    Ok(())
}

async fn list_models(config_path: &Path, url: Option<String>) -> Result<()> {
    let base_url = match url {
        Some(url) => url,
        None => load_config(config_path)?.llm.base_url,
    };

    let provider = OllamaProvider::new(&base_url);
    let models = provider
        .list_models()
        .await
        .with_context(|| format!("Failed to connect to Ollama at {}", provider.base_url()))?;

    if models.is_empty() {
        println!("{}", "No models found".yellow());
        println!("Pull a model with: {}", "ollama pull llama3.2:3b".cyan());
        return Ok(());
    }

    println!("{}", "Available Models:".bold().green());
    println!();
    for model in models {
        println!("  {} ({:.2} GB)", model.name.cyan(), model.size_gb());
    }

    Ok(())
}

async fn ask(
    config_path: &Path,
    message: &str,
    files: &[PathBuf],
    dirs: &[PathBuf],
    source_only: bool,
    save: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let store = ConversationStore::new(&config.storage.chat_history_path);
    let mut manager = ChatManager::new(config);

    for file in files {
        manager.attach_path(file).await?;
    }
    for dir in dirs {
        let added = manager.attach_directory(dir).await?;
        eprintln!("{} {} files from {}", "Attached".dimmed(), added, dir.display());
    }
    if source_only {
        manager.set_source_only(true);
    }

    let reply = manager
        .query_stream(message, |chunk| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();
    print_citations(&reply);

    if save && !reply.demo {
        let path = store.save(manager.conversation()).await.context("Failed to save conversation")?;
        eprintln!("{} {}", "Saved to".dimmed(), path.display());
    }

    Ok(())
}

pub(crate) fn print_citations(reply: &ChatReply) {
    if reply.citations.is_empty() {
        return;
    }

    println!();
    println!("{}", "Sources:".bold());
    for citation in &reply.citations {
        match &citation.name {
            Some(name) => println!("  [{}] {}", citation.index, name.cyan()),
            None => println!("  [{}] {}", citation.index, "(no such source)".yellow()),
        }
    }
}

async fn extract(config_path: &Path, paths: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path)?;
    let processor = FileProcessor::new(config.files);

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = processor
            .process_path(path)
            .await
            .with_context(|| format!("Failed to process {}", path.display()))?;
        if file.truncated {
            eprintln!("{} {} was truncated", "warning:".yellow(), file.name);
        }
        files.push(file);
    }

    println!("{}", build_context(&files));
    Ok(())
}

async fn history(config_path: &Path, command: HistoryCommands) -> Result<()> {
    let config = load_config(config_path)?;
    let store = ConversationStore::new(&config.storage.chat_history_path);

    match command {
        HistoryCommands::List => {
            let conversations = store.list().await.context("Failed to list conversations")?;
            if conversations.is_empty() {
                println!(
                    "{} in {}",
                    "No saved conversations".yellow(),
                    store.dir().display()
                );
                return Ok(());
            }
            for summary in conversations {
                let id = summary.id.to_string();
                println!(
                    "{}  {}  {} ({} messages)",
                    id[..8].cyan(),
                    summary.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    summary.title,
                    summary.message_count
                );
            }
        }
        HistoryCommands::Show { id } => {
            let conversation = store.load(&id).await?;
            println!("{} ({})", conversation.title.bold(), conversation.model.dimmed());
            for message in &conversation.messages {
                println!();
                let role = match message.role.as_str() {
                    "user" => "you".green().bold(),
                    "assistant" => "assistant".cyan().bold(),
                    other => other.normal(),
                };
                println!("{}: {}", role, message.content);
            }
        }
        HistoryCommands::Delete { id } => {
            store.delete(&id).await?;
            println!("{} Deleted {}", "✓".green().bold(), id);
        }
    }

    Ok(())
}

fn template(command: TemplateCommands) -> Result<()> {
    let library = TemplateLibrary::builtin();

    match command {
        TemplateCommands::List => {
            for template in library.list() {
                println!("{:<14} {}", template.id.cyan(), template.description);
            }
        }
        TemplateCommands::Show { id } => {
            let variables = library.variables(&id)?;
            let Some(template) = library.get(&id) else {
                bail!("Unknown template: {}", id);
            };
            println!("{}", template.name.bold());
            println!("{}: {}", "Variables".bold(), variables.join(", "));
            println!();
            println!("{}", template.body);
        }
        TemplateCommands::Generate { id, vars, output } => {
            let vars = parse_vars(&vars)?;
            let rendered = library.render(&id, &vars)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} Wrote {}", "✓".green().bold(), path.display());
                }
                None => print!("{}", rendered),
            }
        }
    }

    Ok(())
}

fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Ok((key.trim().to_string(), value.to_string())),
            None => bail!("Expected KEY=VALUE, got '{}'", pair),
        })
        .collect()
}

async fn canvas(config_path: &Path, command: CanvasCommands) -> Result<()> {
    let config = load_config(config_path)?;
    let path = PathBuf::from(&config.storage.canvas_path);
    let mut state = CanvasState::load_or_default(&path)
        .await
        .with_context(|| format!("Failed to load canvas {}", path.display()))?;

    match command {
        CanvasCommands::New => {
            state = CanvasState::default();
            println!("{} Started a new board", "✓".green().bold());
        }
        CanvasCommands::Show => {
            print_canvas(&state);
            return Ok(());
        }
        CanvasCommands::Add { content, code, x, y } => {
            let kind = match code {
                Some(language) => NodeKind::Code { language },
                None => NodeKind::Text,
            };
            let id = state.add_node(kind, content, Position::new(x, y));
            println!("{} Added {}", "✓".green().bold(), id.cyan());
        }
        CanvasCommands::Connect { source, target, label } => {
            let id = state.connect(&source, &target, label)?;
            println!("{} Connected {} -> {} ({})", "✓".green().bold(), source, target, id);
        }
        CanvasCommands::Undo => {
            if !state.undo() {
                println!("{}", "Nothing to undo".yellow());
                return Ok(());
            }
        }
        CanvasCommands::Redo => {
            if !state.redo() {
                println!("{}", "Nothing to redo".yellow());
                return Ok(());
            }
        }
        CanvasCommands::Snapshot { name } => {
            state.save_snapshot(&name);
            println!("{} Saved snapshot {}", "✓".green().bold(), name.cyan());
        }
        CanvasCommands::Restore { name } => {
            state.restore_snapshot(&name)?;
            println!("{} Restored snapshot {}", "✓".green().bold(), name.cyan());
        }
        CanvasCommands::Share { base } => {
            println!("{}", state.share_link(&base)?);
            return Ok(());
        }
        CanvasCommands::Import { link } => {
            state = CanvasState::from_share_link(&link)?;
            println!(
                "{} Imported board with {} nodes",
                "✓".green().bold(),
                state.canvas().nodes.len()
            );
        }
    }

    state
        .save(&path)
        .await
        .with_context(|| format!("Failed to save canvas {}", path.display()))
}

fn print_canvas(state: &CanvasState) {
    let canvas = state.canvas();
    if canvas.is_empty() {
        println!("{}", "Board is empty".yellow());
        return;
    }

    println!("{}", "Nodes:".bold());
    for node in &canvas.nodes {
        let preview: String = node.content.lines().next().unwrap_or("").chars().take(60).collect();
        println!(
            "  {} [{}] ({:.0}, {:.0}) {}",
            node.id.cyan(),
            node.kind.label(),
            node.position.x,
            node.position.y,
            preview
        );
    }

    if !canvas.edges.is_empty() {
        println!("{}", "Edges:".bold());
        for edge in &canvas.edges {
            let label = edge.label.as_deref().map(|l| format!(" \"{}\"", l)).unwrap_or_default();
            println!("  {} -> {}{}", edge.source, edge.target, label);
        }
    }

    let snapshots = state.snapshots();
    if !snapshots.is_empty() {
        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        println!("{} {}", "Snapshots:".bold(), names.join(", "));
    }
}

async fn serve(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let server = Server::new(config).await.context("Ollama is not available")?;

    println!("{} {}", "Listening on".green(), server.socket_path().display());
    server.start().await.context("Server failed")?;
    Ok(())
}
