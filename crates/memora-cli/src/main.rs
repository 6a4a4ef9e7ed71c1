//! `memora` – a memory companion for people living with memory impairment.
//!
//! This binary:
//!
//! 1. Checks for `~/.memora/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Probes the local Ollama instance and checks the configured text and
//!    vision models are downloaded.
//! 3. Drops the user into an **interactive REPL** where photos become
//!    memories (`/ingest`) and recall sessions run (`/recall`).
//! 4. Intercepts **Ctrl-C** to end the current session cleanly; a second
//!    Ctrl-C exits immediately.

mod config;
mod ollama;
mod presenter;
mod repl;
mod setup;

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

fn main() {
    let _telemetry = memora_runtime::init_tracing("memora-cli");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if shutdown_clone.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – finishing up.  Press Enter to leave, or Ctrl-C again to quit now."
                .yellow()
                .bold()
        );
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::load_or_default()
        }
    };

    probe_ollama(&cfg);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(cfg, runtime, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup probe
// ─────────────────────────────────────────────────────────────────────────────

fn probe_ollama(cfg: &config::Config) {
    print!("\n  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            for (role, name) in [("text", &cfg.text_model), ("vision", &cfg.vision_model)] {
                if ollama::has_model(&models, name) {
                    println!("    {} {} model {}", "✓".green(), role, name.bold());
                } else {
                    println!(
                        "    {} {} model {} is not downloaded.  Run `{}`.",
                        "✗".red(),
                        role,
                        name.bold(),
                        format!("ollama pull {name}").bold()
                    );
                }
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Run `{}` to start a local AI.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       memora First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up memora.\n");

    let mut cfg = config::Config::default();
    config::apply_env_overrides(&mut cfg);

    cfg.ollama_url = repl::prompt_str(&format!("  Ollama URL [{}]: ", cfg.ollama_url), &cfg.ollama_url);
    cfg.text_model = repl::prompt_str(
        &format!("  Model for conversation [{}]: ", cfg.text_model),
        &cfg.text_model,
    );
    cfg.vision_model = repl::prompt_str(
        &format!("  Model for looking at photos [{}]: ", cfg.vision_model),
        &cfg.vision_model,
    );
    let db = cfg.database_path.display().to_string();
    cfg.database_path = PathBuf::from(repl::prompt_str(
        &format!("  Where to keep memories [{}]: ", db),
        &db,
    ));

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____ ___  ___  ____ ___  ____  _________ _"#.bold().cyan());
    println!("{}", r#"  / __ `__ \/ _ \/ __ `__ \/ __ \/ ___/ __ `/"#.bold().cyan());
    println!("{}", r#" / / / / / /  __/ / / / / / /_/ / /  / /_/ / "#.bold().cyan());
    println!("{}", r#"/_/ /_/ /_/\___/_/ /_/ /_/\____/_/   \__,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "memora".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Your daily routine and memories, one gentle hint at a time");
    println!();
}
