use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use flashsoak_core::config::{
    CycleConfig, DEFAULT_BLOCK_SIZE, DEFAULT_RESERVE, DEFAULT_ROUNDS, SeedPolicy,
};
use flashsoak_core::cycle::{CycleObserver, Orchestrator};
use flashsoak_core::payload::Seed;
use flashsoak_core::platform;
use flashsoak_core::probe::SpaceProbe;
use flashsoak_core::round::{Phase, RunReport, TestRound};
use flashsoak_core::volume::{self, Volume};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{IsTerminal, stdin};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

#[derive(Parser)]
#[command(name = "flashsoak")]
#[command(about = "Write-and-verify endurance testing for USB drives and SD cards", version)]
struct Cli {
    /// Log more (-v for info, -vv for debug). RUST_LOG overrides this
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to stderr as JSON lines
    #[arg(long, global = true, env = "FLASHSOAK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a volume's free space, verify it and delete it, repeatedly
    Run {
        /// Mount point (e.g. /media/usb) or drive letter (e.g. E:). Asked for
        /// interactively when omitted
        #[arg(short, long, env = "FLASHSOAK_PATH")]
        path: Option<String>,

        /// Number of write-verify rounds
        #[arg(short, long, default_value_t = DEFAULT_ROUNDS, env = "FLASHSOAK_ROUNDS")]
        rounds: u32,

        /// Bytes per read/write call (accepts K, M, G suffixes)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE as u64, value_parser = parse_size, env = "FLASHSOAK_BLOCK_SIZE")]
        block_size: u64,

        /// Free space to leave untouched (accepts K, M, G suffixes)
        #[arg(long, default_value_t = DEFAULT_RESERVE, value_parser = parse_size, env = "FLASHSOAK_RESERVE")]
        reserve: u64,

        /// Draw a random payload seed for this run instead of the fixed one
        #[arg(long, conflicts_with = "seed")]
        random_seed: bool,

        /// Payload seed as 64 hex digits, e.g. to replay a recorded run
        #[arg(long, value_parser = parse_seed)]
        seed: Option<Seed>,

        /// Leave the test file on the volume if a round fails
        #[arg(long)]
        keep_failed: bool,

        /// Don't ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,

        /// Print the final report as JSON on stdout instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List mounted removable volumes
    List,
}

/// Parses a byte count with an optional binary `K`, `M` or `G` suffix.
fn parse_size(input: &str) -> Result<u64, String> {
    let s = input.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let multiplier = match c.to_ascii_uppercase() {
                'K' => 1u64 << 10,
                'M' => 1 << 20,
                'G' => 1 << 30,
                _ => return Err(format!("unknown size suffix '{c}' in '{input}'")),
            };
            (&s[..i], multiplier)
        }
        _ => (s, 1),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("'{input}' is not a byte count"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{input}' is too large"))
}

fn parse_seed(input: &str) -> Result<Seed, String> {
    Seed::from_hex(input.trim()).map_err(|e| format!("invalid seed: {e}"))
}

fn init_logging(verbose: u8, json: bool) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

/// Presents an interactive menu for the user to select a volume.
fn select_volume(volumes: &[Volume], prompt: &str) -> Result<Volume> {
    if volumes.is_empty() {
        return Err(anyhow!("No mounted removable volumes found. Pass --path explicitly."));
    }

    let items: Vec<String> = volumes.iter().map(|v| v.to_string()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(volumes[selection].clone())
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

fn bar_style(colour: &str) -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(&format!(
        "{{prefix:12}} [{{elapsed_precise}}] [{{bar:40.{colour}/black}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}})"
    ))?
    .progress_chars("■ "))
}

/// Connects the orchestrator's hooks to progress bars.
struct ConsoleObserver {
    rounds: u32,
    hidden: bool,
    write_style: ProgressStyle,
    verify_style: ProgressStyle,
    spinner_style: ProgressStyle,
    bar: ProgressBar,
}

impl ConsoleObserver {
    fn new(rounds: u32, hidden: bool) -> Result<Self> {
        Ok(Self {
            rounds,
            hidden,
            write_style: bar_style("green")?,
            verify_style: bar_style("magenta")?,
            spinner_style: ProgressStyle::with_template(
                "{prefix:12} [{elapsed_precise}] {spinner} {msg}",
            )?,
            bar: ProgressBar::hidden(),
        })
    }

    fn replace_bar(&mut self, bar: ProgressBar) {
        self.bar.finish_and_clear();
        self.bar = if self.hidden { ProgressBar::hidden() } else { bar };
    }
}

impl CycleObserver for ConsoleObserver {
    fn round_started(&mut self, round: u32, file: &Path) {
        if !self.hidden {
            println!(
                "\n{} {}",
                style(format!("Round {round}/{}", self.rounds)).bold(),
                style(file.display()).cyan()
            );
        }
    }

    fn phase_started(&mut self, _round: u32, phase: Phase, total: u64) {
        match phase {
            Phase::Writing => {
                let bar = ProgressBar::new(total);
                bar.set_style(self.write_style.clone());
                bar.set_prefix("Writing");
                self.replace_bar(bar);
            }
            Phase::Flushing => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(self.spinner_style.clone());
                bar.set_prefix("Flushing");
                bar.set_message("waiting for the device to commit data");
                bar.enable_steady_tick(Duration::from_millis(100));
                self.replace_bar(bar);
            }
            Phase::Verifying => {
                let bar = ProgressBar::new(total);
                bar.set_style(self.verify_style.clone());
                bar.set_prefix("Verifying");
                self.replace_bar(bar);
            }
            _ => {}
        }
    }

    fn progress(&mut self, _round: u32, _phase: Phase, bytes: u64) {
        self.bar.set_position(bytes);
    }

    fn round_finished(&mut self, round: &TestRound) {
        self.replace_bar(ProgressBar::hidden());
        if self.hidden {
            return;
        }
        match &round.failure {
            None => println!(
                "  {} {:.2} GB, digest {}",
                style("✔ passed").green().bold(),
                round.target_bytes as f64 / GIB,
                short_digest(round.write_digest.as_deref())
            ),
            Some(failure) => println!("  {} {}", style("✘").red().bold(), failure),
        }
        if let Some(cleanup) = &round.cleanup_error {
            println!("  {} {}", style("warning:").yellow().bold(), cleanup);
        }
    }
}

fn short_digest(digest: Option<&str>) -> String {
    match digest {
        Some(d) if d.len() > 16 => format!("{}…", &d[..16]),
        Some(d) => d.to_string(),
        None => "-".to_string(),
    }
}

fn rate(bytes_per_sec: Option<f64>) -> String {
    bytes_per_sec
        .map(|r| format!("{:.1} MB/s", r / MIB))
        .unwrap_or_else(|| "-".to_string())
}

fn print_report(report: &RunReport) {
    println!("\n{}", style("Summary").bold());
    println!(
        "\n  {:<6} {:>10} {:>12} {:>12} {:<18} {}",
        "ROUND", "SIZE", "WRITE", "VERIFY", "DIGEST", "RESULT"
    );
    println!(
        "  {:-<6} {:-<10} {:-<12} {:-<12} {:-<18} {:-<20}",
        "", "", "", "", "", ""
    );
    for round in &report.rounds {
        let result = match &round.failure {
            None if round.baseline_consistent => style("ok".to_string()).green(),
            None => style("ok (no baseline)".to_string()).yellow(),
            Some(failure) => style(format!("FAILED in {}", failure.phase)).red(),
        };
        println!(
            "  {:<6} {:>7.2} GB {:>12} {:>12} {:<18} {}",
            round.index,
            round.target_bytes as f64 / GIB,
            rate(round.write_rate()),
            rate(round.verify_rate()),
            short_digest(round.verify_digest.as_deref()),
            result
        );
    }
    if let Some(seed) = report.rounds.first().map(|r| &r.seed) {
        println!("\n  Seed:     {seed}");
    }
    if let Some(baseline) = &report.baseline_digest {
        println!("  Baseline: {baseline}");
    }
    for round in &report.rounds {
        if let Some(change) = round.capacity_change {
            println!(
                "  Round {}: free space changed by {} bytes since round 1",
                round.index, change
            );
        }
        if let Some(drift) = &round.baseline_error {
            println!("  Round {}: {}", round.index, style(drift).red());
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    path: Option<String>,
    rounds: u32,
    block_size: u64,
    reserve: u64,
    random_seed: bool,
    seed: Option<Seed>,
    keep_failed: bool,
    yes: bool,
    json: bool,
) -> Result<()> {
    let interactive = stdin().is_terminal();

    let target: PathBuf = match path {
        Some(p) => platform::normalize_target(&p)?,
        None if interactive => {
            let volumes = volume::removable_volumes();
            select_volume(&volumes, "Select the volume to TEST")?.mount_point
        }
        None => bail!("--path is required when not running interactively"),
    };

    let seed_policy = match (random_seed, seed) {
        (true, _) => SeedPolicy::RandomPerRun,
        (false, Some(seed)) => SeedPolicy::Fixed(seed),
        (false, None) => SeedPolicy::default(),
    };
    let block_size = usize::try_from(block_size).context("block size does not fit in memory")?;
    let config = CycleConfig::new(&target)
        .rounds(rounds)
        .block_size(block_size)
        .reserve(reserve)
        .seed(seed_policy)
        .keep_failed_file(keep_failed);

    let probe = platform::native_probe();
    let space = probe
        .probe(&target)
        .with_context(|| format!("cannot query free space on {}", target.display()))?;

    if !yes {
        if !interactive {
            bail!("refusing to fill {} without --yes", target.display());
        }
        println!(
            "{} This will fill {:.2} GB of free space on '{}' {} times.",
            style("NOTE:").yellow().bold(),
            space.available.saturating_sub(reserve) as f64 / GIB,
            target.display(),
            rounds
        );
        println!("  Existing files are left alone; each round's test file is deleted afterwards.");
        println!();
        if !confirm_operation("Are you sure you want to proceed?")? {
            println!("Endurance test cancelled.");
            return Ok(());
        }
    }

    let orchestrator = Orchestrator::new(config, probe)?;
    let mut observer = ConsoleObserver::new(rounds, json)?;
    let report = orchestrator.run(&mut observer);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.passed {
        return Err(match report.failed_round() {
            Some(round) => match &round.failure {
                Some(failure) => anyhow!("round {} failed: {}", round.index, failure),
                None => anyhow!("round {} failed", round.index),
            },
            None => anyhow!("endurance run did not complete"),
        });
    }

    if !json {
        println!(
            "\n✨ All {} rounds passed on {}.",
            report.rounds.len(),
            style(target.display()).cyan()
        );
    }
    Ok(())
}

fn list() -> Result<()> {
    let volumes = volume::removable_volumes();
    if volumes.is_empty() {
        println!("No mounted removable volumes found.");
        return Ok(());
    }

    println!("Found {} removable volumes:", volumes.len());
    println!(
        "\n  {:<25} {:<12} {:<8} {:>10} {:>10}",
        "MOUNT POINT", "DEVICE", "FS", "FREE", "SIZE"
    );
    println!("  {:-<25} {:-<12} {:-<8} {:-<10} {:-<10}", "", "", "", "", "");
    for volume in volumes {
        println!(
            "  {:<25} {:<12} {:<8} {:>7.1} GB {:>7.1} GB{}",
            volume.mount_point.display(),
            volume.name,
            volume.file_system,
            volume.available_gb(),
            volume.total_gb(),
            if volume.read_only { "  (read-only)" } else { "" }
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    match cli.command {
        Commands::Run {
            path,
            rounds,
            block_size,
            reserve,
            random_seed,
            seed,
            keep_failed,
            yes,
            json,
        } => run(
            path,
            rounds,
            block_size,
            reserve,
            random_seed,
            seed,
            keep_failed,
            yes,
            json,
        ),
        Commands::List => list(),
    }
}
