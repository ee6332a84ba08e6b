//! Command-line entry point for pdm-backup

use clap::Parser;
use pdm_backup::{BackupOrchestrator, Config, PdmClient, credentials, report};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Back up every project and file of a PDM account", long_about = None)]
struct Cli {
    /// JSON configuration file (all fields optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API base URL (production: https://api.getbild.com)
    #[arg(long)]
    base_url: Option<String>,

    /// Directory receiving the backup
    #[arg(short, long)]
    backup_dir: Option<PathBuf>,

    /// File containing only the API bearer token
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    /// Pause between projects in milliseconds
    #[arg(long)]
    project_delay_ms: Option<u64>,

    /// Do not ask for confirmation when the backup directory is not empty
    #[arg(short, long)]
    yes: bool,

    /// Do not write the JSON run log
    #[arg(long)]
    no_log: bool,
}

impl Cli {
    fn into_config(self) -> pdm_backup::Result<(Config, Options)> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(base_url) = self.base_url {
            config.api.base_url = base_url;
        }
        if let Some(dir) = self.backup_dir {
            config.backup.backup_dir = dir;
        }
        if let Some(ms) = self.project_delay_ms {
            config.backup.project_delay = Duration::from_millis(ms);
        }
        config.validate()?;

        let options = Options {
            key_file: self.key_file,
            assume_yes: self.yes,
            write_log: !self.no_log,
        };
        Ok((config, options))
    }
}

struct Options {
    key_file: Option<PathBuf>,
    assume_yes: bool,
    write_log: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("✗ Cannot proceed: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> pdm_backup::Result<()> {
    print_banner();

    let (config, options) = cli.into_config()?;
    let token = credentials::load_token(options.key_file.as_deref())?;

    let client = PdmClient::new(&config.api, &token)?;
    let orchestrator = BackupOrchestrator::new(client, config)?;
    let root = orchestrator.backup_root();

    println!("API Endpoint: {}", orchestrator.config().api.base_url);
    println!("Backup Location: {}", root.display());
    println!(
        "Start Time: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    if !options.assume_yes && is_non_empty_dir(&root) && !confirm(&root)? {
        println!("Backup cancelled.");
        return Ok(());
    }
    std::fs::create_dir_all(&root)?;

    let run = pdm_backup::run_with_shutdown(&orchestrator).await;

    print!("\n{}", report::render_summary(&run));

    if options.write_log {
        match report::save_log(&run, &root, &orchestrator.config().backup.log_prefix).await {
            Ok(path) => println!("\n✓ Backup log saved to: {}", path.display()),
            Err(e) => {
                tracing::warn!(error = %e, code = e.error_code(), "failed to save backup log");
                println!("\n✗ Error saving backup log: {e}");
            }
        }
    }

    if run.interrupted {
        println!("\n⚠ Backup interrupted by user. Rerun to continue where it stopped.");
    } else {
        println!("\n✓ Backup process completed!");
        println!("✓ All files saved to: {}", root.display());
    }
    Ok(())
}

fn print_banner() {
    let rule = "=".repeat(80);
    println!("{rule}");
    println!("PDM COMPLETE BACKUP TOOL");
    println!("{rule}");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("{rule}");
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn confirm(root: &Path) -> pdm_backup::Result<bool> {
    println!("\nWARNING: Backup directory already exists and contains files.");
    println!("Location: {}", root.display());
    print!("Continue with backup? (y/N): ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
