//! Boardwalk CLI - multi-node terminal BBS host.
//!
//! This is the main binary entry point. See the `boardwalk` library for the
//! engine. Network acceptors are deployed separately; the binary offers a
//! local console session and a menu-set validator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use boardwalk::store::{InMemoryFileStore, InMemoryMessageStore};
use boardwalk::{Board, BoardConfig, JsonUserManager, MenuSet, SessionLink, User, UserManager};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Parser, Subcommand};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(name = "boardwalk", version, about = "Multi-node terminal BBS host")]
struct Cli {
    /// Path to boardwalk.json (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single node on this terminal (no network acceptor needed).
    Local,
    /// Validate a menu set: records, screens, and GOTO targets.
    Check {
        /// Menu-set directory (defaults to the configured one).
        #[arg(long)]
        menu_set: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => BoardConfig::default_path()?,
    };
    let config = BoardConfig::load(&config_path)?;

    match cli.command {
        Command::Local => run_local(config).await,
        Command::Check { menu_set } => run_check(&config, menu_set),
    }
}

/// Builds the development stores and serves one session on stdio.
async fn run_local(config: BoardConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    let users = Arc::new(JsonUserManager::load(&config.data_dir.join("users.json"))?);
    seed_sysop(&users)?;
    let messages = Arc::new(InMemoryMessageStore::from_json_file(
        &config.data_dir.join("messages.json"),
    )?);
    let files = Arc::new(InMemoryFileStore::from_json_file(
        &config.data_dir.join("files.json"),
    )?);

    let output_mode = config.output_mode;
    let board = Arc::new(Board::new(config, users, messages, files));

    let (width, height) = crossterm::terminal::size().unwrap_or((80, 25));
    crossterm::terminal::enable_raw_mode().context("failed to enter raw mode")?;
    // Restore the invoking terminal even if the session errors out.
    scopeguard::defer! {
        let _ = crossterm::terminal::disable_raw_mode();
    }

    let mut link = SessionLink::from_stream(
        Box::new(tokio::io::stdin()),
        Box::new(tokio::io::stdout()),
        true,
        output_mode,
    );
    link.width = width;
    link.height = height;

    let outcome = board.run_session(link).await?;
    log::info!("local session finished: {outcome:?}");
    println!("\r\nThanks for calling.\r");
    Ok(())
}

/// Seeds a default sysop account so a fresh board is enterable.
fn seed_sysop(users: &JsonUserManager) -> Result<()> {
    if users.get_by_handle("SYSOP")?.is_some() {
        return Ok(());
    }
    let sysop = User {
        id: 1,
        handle: "Sysop".to_string(),
        real_name: "System Operator".to_string(),
        access_level: 255,
        validated: true,
        flags: "S".to_string(),
        password: "sysop".to_string(),
        ..User::default()
    };
    users.save(&sysop)?;
    println!("Created default account Sysop/sysop - change the password.");
    Ok(())
}

/// Validates every menu in a set; exits nonzero when problems exist.
fn run_check(config: &BoardConfig, menu_set: Option<PathBuf>) -> Result<()> {
    let root = menu_set.unwrap_or_else(|| config.menu_set.clone());
    let set = MenuSet::new(&root);
    let names = set.menu_names()?;
    if names.is_empty() {
        anyhow::bail!("no .MNU records under {}", root.join("mnu").display());
    }

    let mut problems = 0usize;
    for name in &names {
        let menu = match set.load_menu(name) {
            Ok(menu) => menu,
            Err(e) => {
                println!("{name}: broken menu record: {e:#}");
                problems += 1;
                continue;
            }
        };
        if !set.screen_path(name).exists() {
            println!("{name}: missing screen {}", set.screen_path(name).display());
            problems += 1;
        }
        if !menu.fallback.is_empty() && !names.contains(&menu.fallback.to_uppercase()) {
            println!("{name}: fallback '{}' is not a menu", menu.fallback);
            problems += 1;
        }
        match set.load_commands(name) {
            Ok(commands) => {
                for command in commands {
                    problems += check_command(name, &command.command, &names);
                }
            }
            Err(e) => {
                println!("{name}: broken command list: {e:#}");
                problems += 1;
            }
        }
        if let Err(e) = set.load_lightbar(name) {
            println!("{name}: broken lightbar config: {e:#}");
            problems += 1;
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) in menu set {}", root.display());
    }
    println!("{} menus OK in {}", names.len(), root.display());
    Ok(())
}

/// Checks one action string; returns the number of problems found.
fn check_command(menu: &str, action: &str, names: &[String]) -> usize {
    let action = action.trim();
    if action.is_empty() {
        println!("{menu}: command with empty action");
        return 1;
    }
    let (verb, arg) = action
        .split_once(':')
        .map_or((action, ""), |(v, a)| (v, a));
    match verb.to_uppercase().as_str() {
        "GOTO" => {
            if !arg.eq_ignore_ascii_case("LOGOFF") && !names.contains(&arg.to_uppercase()) {
                println!("{menu}: GOTO target '{arg}' is not a menu");
                return 1;
            }
            0
        }
        "RUN" | "DOOR" => {
            if arg.is_empty() {
                println!("{menu}: {verb} without an argument");
                return 1;
            }
            0
        }
        "LOGOFF" => 0,
        other => {
            println!("{menu}: unknown verb '{other}' in '{action}'");
            1
        }
    }
}
