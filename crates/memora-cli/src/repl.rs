//! REPL – the interactive memora shell.
//!
//! Supported slash-commands:
//!   /help             – show this list
//!   /setup            – fill in or update the personal profile
//!   /ingest <image>   – turn a photo into a memory record
//!   /memories         – list the memory log
//!   /profile          – show the assembled profile
//!   /recall           – start a recall session
//!   /models           – list models and switch the text or vision model
//!   /settings         – edit `~/.memora/config.toml`
//!   /quit | /exit     – leave memora

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use memora_memory::{ProfileAssembler, SqliteStore, StorageError, StorageGateway};
use memora_perception::{OllamaVision, PerceptionAdapter};
use memora_runtime::{MemoryRecordBuilder, OllamaGateway, RecallSessionMachine, prompts, run_session};
use memora_types::MemoryRecord;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::ollama;
use crate::presenter::TerminalPresenter;
use crate::setup;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Setup,
    Ingest(Option<PathBuf>),
    Memories,
    Profile,
    Recall,
    Models,
    Settings,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head {
            "/help" => Command::Help,
            "/setup" => Command::Setup,
            "/ingest" => Command::Ingest((!rest.is_empty()).then(|| PathBuf::from(unquote(rest)))),
            "/memories" => Command::Memories,
            "/profile" => Command::Profile,
            "/recall" => Command::Recall,
            "/models" => Command::Models,
            "/settings" => Command::Settings,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Strip one pair of matching quotes, as left by drag-and-drop into a terminal.
fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a command needs, built from the current [`Config`].
struct Services {
    store: Arc<SqliteStore>,
    builder: MemoryRecordBuilder,
    gateway: Arc<OllamaGateway>,
}

impl Services {
    fn open(cfg: &Config) -> Result<Self, String> {
        if let Some(parent) = cfg.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            config::create_private_dir(parent)?;
        }
        let store = Arc::new(
            SqliteStore::open(&cfg.database_path)
                .map_err(|e| format!("Failed to open {}: {}", cfg.database_path.display(), e))?,
        );
        if let Err(e) = config::set_mode(&cfg.database_path, 0o600) {
            warn!(error = %e, "memory store left with its existing permissions");
        }

        let mut perception = PerceptionAdapter::new();
        perception.register_all(Arc::new(OllamaVision::new(&cfg.ollama_url, &cfg.vision_model)));
        perception.init();

        let builder = MemoryRecordBuilder::new(Arc::new(perception), store.clone());
        let gateway = Arc::new(OllamaGateway::new(&cfg.ollama_url, &cfg.text_model));
        Ok(Self {
            store,
            builder,
            gateway,
        })
    }
}

/// The REPL's mutable state.
struct Shell {
    cfg: Config,
    services: Option<Services>,
    runtime: Runtime,
    shutdown: Arc<AtomicBool>,
}

impl Shell {
    /// Rebuild services after the config changed.
    fn reload(&mut self, cfg: Config) {
        self.services = match Services::open(&cfg) {
            Ok(s) => Some(s),
            Err(e) => {
                println!("{}: {}", "Storage error".red(), e);
                None
            }
        };
        self.cfg = cfg;
    }

    fn services(&self) -> Option<&Services> {
        if self.services.is_none() {
            println!(
                "{} Check {} in {}.",
                "The memory store is not available.".red(),
                "database_path".bold(),
                "/settings".bold().cyan()
            );
        }
        self.services.as_ref()
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(cfg: Config, runtime: Runtime, shutdown: Arc<AtomicBool>) {
    let mut shell = Shell {
        cfg: cfg.clone(),
        services: None,
        runtime,
        shutdown: shutdown.clone(),
    };
    shell.reload(cfg);

    if let Some(services) = &shell.services
        && matches!(services.store.load_personal(), Err(StorageError::NoRows(_)))
    {
        println!(
            "  No personal profile yet.  Run {} to create one.\n",
            "/setup".bold().cyan()
        );
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "memora>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Command::Help => cmd_help(),
            Command::Setup => cmd_setup(&shell),
            Command::Ingest(path) => cmd_ingest(&shell, path.as_deref()),
            Command::Memories => cmd_memories(&shell),
            Command::Profile => cmd_profile(&shell),
            Command::Recall => cmd_recall(&shell),
            Command::Models => cmd_models(&mut shell),
            Command::Settings => cmd_settings(&mut shell),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "memora Commands".bold().underline());
    println!("  {}           – create or update the personal profile", "/setup".bold().cyan());
    println!("  {}  – turn a photo into a memory", "/ingest <image>".bold().cyan());
    println!("  {}        – list stored memories", "/memories".bold().cyan());
    println!("  {}         – show what the assistant knows", "/profile".bold().cyan());
    println!("  {}          – start a recall session", "/recall".bold().cyan());
    println!("  {}          – list and switch AI models", "/models".bold().cyan());
    println!("  {}        – edit ~/.memora/config.toml", "/settings".bold().cyan());
    println!("  {}     – exit memora", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_setup(shell: &Shell) {
    let Some(services) = shell.services() else {
        return;
    };
    let current = match services.store.load_personal() {
        Ok(record) => Some(record),
        Err(StorageError::NoRows(_)) => None,
        Err(e) => {
            println!("{}: {}", "Could not read the profile".red(), e);
            return;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let Some(record) = setup::run_wizard(&mut stdin.lock(), &mut stdout, current.as_ref()) else {
        println!("\n{}", "Setup cancelled; nothing was saved.".yellow());
        return;
    };
    match services.store.save_personal(&record) {
        Ok(()) => {
            info!(fields = record.len(), "personal profile saved");
            println!("{}", "✓ Profile saved.".green());
        }
        Err(e) => println!("{}: {}", "Error saving profile".red(), e),
    }
}

fn cmd_ingest(shell: &Shell, path: Option<&Path>) {
    let Some(path) = path else {
        println!("Usage: {}", "/ingest <image>".bold());
        return;
    };
    if !path.is_file() {
        println!("{} {}", "No such image:".red(), path.display().to_string().yellow());
        return;
    }
    let Some(services) = shell.services() else {
        return;
    };

    print!("  Looking at {} with {} … ", path.display().to_string().bold(), shell.cfg.vision_model.yellow());
    io::stdout().flush().ok();
    match shell.runtime.block_on(services.builder.build_record(path)) {
        Ok(record) => {
            println!("{}", "done".green());
            print_record(&record);
        }
        Err(e) => {
            println!("{}", "failed".red());
            println!("  {}", e);
        }
    }
}

fn cmd_memories(shell: &Shell) {
    let Some(services) = shell.services() else {
        return;
    };
    match services.store.all_records() {
        Ok(records) if records.is_empty() => {
            println!("  No memories yet.  Add one with {}.", "/ingest <image>".bold().cyan());
        }
        Ok(records) => {
            println!("{}", "Memories".bold().underline());
            for (i, r) in records.iter().enumerate() {
                println!(
                    "  {:>3}. {}  {}  {}",
                    i + 1,
                    r.recorded_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    r.scene.yellow(),
                    r.image_path.bold()
                );
                if !r.caption.is_empty() {
                    println!("       {}", r.caption);
                }
            }
        }
        Err(e) => println!("{}: {}", "Could not read memories".red(), e),
    }
}

fn cmd_profile(shell: &Shell) {
    let Some(services) = shell.services() else {
        return;
    };
    match ProfileAssembler::load(services.store.as_ref()) {
        Ok(profile) => match serde_json::to_string_pretty(&profile) {
            Ok(json) => println!("{json}"),
            Err(_) => print!("{}", prompts::render_profile(&profile)),
        },
        Err(StorageError::NoRows(_)) => {
            println!("  No personal profile yet.  Run {} first.", "/setup".bold().cyan());
        }
        Err(e) => println!("{}: {}", "Could not assemble profile".red(), e),
    }
}

fn cmd_recall(shell: &Shell) {
    let Some(services) = shell.services() else {
        return;
    };
    let profile = match ProfileAssembler::load(services.store.as_ref()) {
        Ok(p) => p,
        Err(StorageError::NoRows(_)) => {
            println!("  No personal profile yet.  Run {} first.", "/setup".bold().cyan());
            return;
        }
        Err(e) => {
            println!("{}: {}", "Could not assemble profile".red(), e);
            return;
        }
    };

    let mut machine = RecallSessionMachine::new(Arc::new(profile), services.gateway.clone());
    let stdin = io::stdin();
    let mut presenter = TerminalPresenter::new(stdin.lock(), io::stdout(), shell.shutdown.clone());

    let revealed = shell.runtime.block_on(run_session(&mut machine, &mut presenter));
    println!(
        "\n  {} {} memor{} recalled together.\n",
        "✓".green().bold(),
        revealed,
        if revealed == 1 { "y" } else { "ies" }
    );
}

fn cmd_models(shell: &mut Shell) {
    let cfg = shell.cfg.clone();
    println!("{}", "AI Models".bold().underline());
    println!("  Text model   : {}", cfg.text_model.yellow());
    println!("  Vision model : {}", cfg.vision_model.yellow());

    print!("  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    io::stdout().flush().ok();
    let models = match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) if models.is_empty() => {
            println!("{}", "no models found".yellow());
            println!(
                "  Run `ollama pull {}` and `ollama pull {}` to download them.",
                cfg.text_model, cfg.vision_model
            );
            return;
        }
        Ok(models) => models,
        Err(e) => {
            println!("{}", "offline".red());
            println!("  {}", e.dimmed());
            println!("  Is Ollama running?  Try: ollama serve");
            return;
        }
    };

    println!("{}", "online".green());
    println!("  Available local models:");
    for m in &models {
        let marker = if ollama::has_model(std::slice::from_ref(m), &cfg.text_model)
            || ollama::has_model(std::slice::from_ref(m), &cfg.vision_model)
        {
            "▶"
        } else {
            " "
        };
        println!("    {} {}", marker.green(), m.name.bold());
    }

    let mut new_cfg = cfg.clone();
    let text = prompt_str(&format!("  Text model [{}]: ", cfg.text_model), &cfg.text_model);
    let vision = prompt_str(&format!("  Vision model [{}]: ", cfg.vision_model), &cfg.vision_model);
    for (chosen, slot) in [(text, &mut new_cfg.text_model), (vision, &mut new_cfg.vision_model)] {
        if ollama::has_model(&models, &chosen) {
            *slot = chosen;
        } else if chosen != *slot {
            println!("{} '{}'", "Unknown model:".red(), chosen.yellow());
        }
    }

    if new_cfg != cfg {
        save_and_reload(shell, new_cfg);
    }
}

fn cmd_settings(shell: &mut Shell) {
    let mut cfg = shell.cfg.clone();

    println!("{}", "Settings Editor".bold().underline());
    cfg.ollama_url = prompt_str(&format!("  Ollama URL    [{}]: ", cfg.ollama_url), &cfg.ollama_url);
    cfg.text_model = prompt_str(&format!("  Text model    [{}]: ", cfg.text_model), &cfg.text_model);
    cfg.vision_model =
        prompt_str(&format!("  Vision model  [{}]: ", cfg.vision_model), &cfg.vision_model);
    let db = cfg.database_path.display().to_string();
    cfg.database_path = PathBuf::from(prompt_str(&format!("  Database file [{}]: ", db), &db));

    save_and_reload(shell, cfg);
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn save_and_reload(shell: &mut Shell, cfg: Config) {
    match config::save(&cfg) {
        Ok(()) => println!(
            "{} {}",
            "✓ Settings saved to".green(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => {
            warn!(error = %e, "config not saved; using new settings for this run only");
            println!("{}: {}", "Error saving config".red(), e);
        }
    }
    shell.reload(cfg);
}

fn print_record(record: &MemoryRecord) {
    let none = || "none".dimmed().to_string();
    println!("  {:<9} {}", "Caption".bold(), record.caption);
    println!("  {:<9} {}", "Scene".bold(), record.scene);
    println!("  {:<9} {}", "People".bold(), record.people_count);
    let objects = record.objects_joined();
    println!("  {:<9} {}", "Objects".bold(), if objects.is_empty() { none() } else { objects });
    let text = record.text_joined();
    println!("  {:<9} {}", "Text".bold(), if text.is_empty() { none() } else { text });
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => default.to_string(),
    }
}
