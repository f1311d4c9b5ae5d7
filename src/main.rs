// zram-tune - Reconcile, save and apply zram swap settings
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use zram_tune::backend::ConfiguredBackend;
use zram_tune::config::Config;
use zram_tune::helpers::parse_size;
use zram_tune::preset::{ConfigPresets, PresetProvider};
use zram_tune::registry::{Commit, Profile, TweakRegistry};
use zram_tune::state::{zram_field, TweakState, ZRAM_SCHEMA};
use zram_tune::tweak::TweakHandle;
use zram_tune::view::{available_algorithms, SizeChoice};

#[derive(Parser)]
#[command(name = "zram-tune")]
#[command(about = "Reconcile, save and apply zram swap settings")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current, saved and pending zram settings
    Show,
    /// Edit zram settings, then save and/or apply them
    Set {
        /// Disk size: bytes, 512M, 4G or a percentage of RAM (50%)
        #[arg(long)]
        disksize: Option<String>,
        /// Compression algorithm
        #[arg(long)]
        algorithm: Option<String>,
        /// Enable or disable the zram swap device
        #[arg(long)]
        enabled: Option<bool>,
        /// Persist the settings
        #[arg(long)]
        save: bool,
        /// Push the settings to the running system
        #[arg(long)]
        apply: bool,
    },
    /// Apply a profile file of tunable.field=value lines
    Profile {
        file: PathBuf,
        #[arg(long)]
        save: bool,
        #[arg(long)]
        apply: bool,
    },
    /// Print the pending state of every tunable as a profile
    Export,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose || std::env::var("DEBUG").is_ok() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    let result = match cli.command {
        Some(Commands::Show) => show().await,
        Some(Commands::Set {
            disksize,
            algorithm,
            enabled,
            save,
            apply,
        }) => set(disksize, algorithm, enabled, Commit::from_flags(save, apply)).await,
        Some(Commands::Profile { file, save, apply }) => {
            profile(file, Commit::from_flags(save, apply)).await
        }
        Some(Commands::Export) => export().await,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            return;
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Build the registry from configuration and load every tunable
async fn load_registry() -> Result<TweakRegistry<ConfiguredBackend>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = Arc::new(ConfiguredBackend::from_config(&config)?);
    let presets = ConfigPresets::new(config);

    let mut registry = TweakRegistry::new();
    registry.register(Arc::new(TweakHandle::new(
        &ZRAM_SCHEMA,
        presets.default_preset(ZRAM_SCHEMA.id),
        backend,
    )));
    registry.load_all().await;
    Ok(registry)
}

/// Format a byte-count field as human-readable size
fn format_size(value: Option<&str>) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    let Some(bytes) = value.and_then(|v| v.parse::<u64>().ok()) else {
        return "--".to_string();
    };
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.0} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn describe(state: &TweakState) -> String {
    if state.is_empty() {
        return "none".to_string();
    }
    let enabled = match state.get(zram_field::ENABLED) {
        Some("0") => "disabled",
        Some(_) => "enabled",
        None => "--",
    };
    format!(
        "{}, {}, {}",
        format_size(state.get(zram_field::DISKSIZE)),
        state.defined(zram_field::ALGORITHM).unwrap_or("--"),
        enabled
    )
}

async fn show() -> CliResult {
    let registry = load_registry().await?;
    let tweak = registry.get(ZRAM_SCHEMA.id)?;
    let session = tweak.session()?;
    let view = tweak.render()?;

    println!("Zram:");
    println!("  Current:       {}", describe(session.current()));
    println!("  Saved:         {}", describe(session.saved()));
    println!("  Pending:       {}", describe(session.pending()));

    let size = match view.size {
        SizeChoice::Preset(mib) => format!("preset {} MiB", mib),
        SizeChoice::Custom { value_mib: Some(mib), .. } => format!("custom {} MiB", mib),
        SizeChoice::Custom { placeholder_mib, .. } => {
            format!("custom (reference {} MiB)", placeholder_mib)
        }
    };
    println!("  Size choice:   {}", size);

    if !view.algorithms.is_empty() {
        let names: Vec<String> = view
            .algorithms
            .iter()
            .map(|a| if a.selected { format!("[{}]", a.name) } else { a.name.clone() })
            .collect();
        println!("  Algorithms:    {}", names.join(" "));
    }

    if view.pending_changes {
        println!("  Unsaved:       {}", session.changed_fields().join(", "));
    } else {
        println!("  Unsaved:       none");
    }
    Ok(())
}

async fn set(
    disksize: Option<String>,
    algorithm: Option<String>,
    enabled: Option<bool>,
    commit: Commit,
) -> CliResult {
    let registry = load_registry().await?;
    let tweak = registry.get(ZRAM_SCHEMA.id)?;

    if let Some(size) = disksize {
        tweak.select_disksize(parse_size(&size)?)?;
    }
    if let Some(alg) = algorithm {
        let session = tweak.session()?;
        let available = available_algorithms(session.current());
        if !available.is_empty() && !available.contains(&alg.as_str()) {
            warn!("Zram: {} is not in the available algorithms ({})", alg, available.join(", "));
        }
        tweak.select_algorithm(&alg)?;
    }
    if let Some(enabled) = enabled {
        tweak.set_enabled(enabled)?;
    }

    if commit.saves() {
        tweak.save().await?;
    }
    if commit.applies() {
        tweak.apply().await?;
    }

    if commit == Commit::None {
        let session = tweak.session()?;
        info!("Pending: {}", describe(session.pending()));
        if session.has_pending_changes() {
            info!(
                "Changed: {} (use --save and/or --apply to commit)",
                session.changed_fields().join(", ")
            );
        }
    }
    Ok(())
}

async fn profile(file: PathBuf, commit: Commit) -> CliResult {
    let profile = Profile::load(&file)?;
    if profile.is_empty() {
        warn!("Profile {} sets nothing", file.display());
        return Ok(());
    }

    let registry = load_registry().await?;
    let outcomes = registry.apply_profile(&profile, commit).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(true) => println!("{}: unsaved changes", outcome.tunable),
            Ok(false) => println!("{}: ok", outcome.tunable),
            Err(e) => {
                println!("{}: {}", outcome.tunable, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} tunables failed", failed, outcomes.len()).into());
    }
    Ok(())
}

async fn export() -> CliResult {
    let registry = load_registry().await?;
    print!("{}", registry.snapshot().to_text());
    Ok(())
}
