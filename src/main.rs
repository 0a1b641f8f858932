use anyhow::{Context, Result};
use clap::Parser;
use stationwatch::{StationConfig, StationOrchestrator};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "stationwatch")]
#[command(about = "Shared workstation monitor driving an LED panel and speech prompts")]
#[command(version)]
#[command(long_about = "Tracks marked objects against table and tray zones, listens for \
noise, runs the task-rotation timer and arbitrates the resulting alerts onto a serial LED \
panel and a text-to-speech voice. Producers send events over UDP.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stationwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Serial device of the LED panel
    #[arg(short, long, value_name = "DEVICE", help = "Serial device node of the LED/buzzer panel")]
    port: Option<String>,

    /// Zone geometry file
    #[arg(long, value_name = "PATH", help = "Zone polygon JSON file")]
    zones: Option<String>,

    /// Allow list file
    #[arg(long, value_name = "PATH", help = "Per-marker allowed regions JSON file")]
    allow: Option<String>,

    /// Disable the task-rotation timer
    #[arg(long, help = "Disable the rotation timer warnings and swaps")]
    no_timer: bool,

    /// Keyboard simulator
    #[arg(long, help = "Publish events from the keyboard (1-6, s, e, q)")]
    simulate: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - load geometry and open devices but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut StationConfig) {
        if let Some(port) = &self.port {
            config.actuation.serial_device = Some(port.clone());
        }
        if let Some(zones) = &self.zones {
            config.zones.zones_path = zones.clone();
        }
        if let Some(allow) = &self.allow {
            config.zones.allow_path = allow.clone();
        }
        if self.no_timer {
            config.timer.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting stationwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match StationConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("✗ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = match StationOrchestrator::new(config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Failed to create station: {}", e);
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };
    orchestrator.set_keyboard_enabled(args.simulate);

    orchestrator
        .initialize()
        .await
        .context("Failed to initialize station")?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - geometry loaded and devices opened");
        return Ok(());
    }

    if let Err(e) = orchestrator.start().await {
        error!("Failed to start station: {}", e);
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Stationwatch exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stationwatch={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&StationConfig::default())
        .context("Failed to render default configuration")?;

    println!("# Stationwatch Configuration File");
    println!("# Every key may also be set as STATIONWATCH_<SECTION>__<KEY>");
    println!();
    println!("{}", rendered);
    Ok(())
}
