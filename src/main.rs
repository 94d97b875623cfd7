use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{debug, error, info, warn};

use slotbot::attempt::BookingAttempt;
use slotbot::config::{BotConfig, ConfigOverrides, RunMode};
use slotbot::interrupt::Interrupt;
use slotbot::logging::{init_logging, LoggingConfig};
use slotbot::retry::RetryController;
use slotbot::ui::{self, SummaryRenderer};
use slotbot::webdriver::WebDriverClient;

#[derive(Parser, Debug)]
#[command(name = "slotbot")]
#[command(version)]
#[command(about = "Polls an appointment portal and books the first open slot")]
struct Cli {
    /// once: a single attempt; continuous: poll until booked
    #[arg(long, value_enum)]
    mode: Option<RunMode>,

    /// Path to a YAML or TOML config file
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Click the final booking button (default is a dry run)
    #[arg(long)]
    execute: bool,

    /// Show the browser window (needed to type the OTP)
    #[arg(long)]
    headful: bool,

    /// Stop after this many attempts (0 = no limit)
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Seconds between polls in continuous mode
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// WebDriver server, e.g. a running chromedriver
    #[arg(long, value_name = "URL")]
    webdriver_url: Option<String>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long)]
    no_color: bool,

    /// Only print warnings and errors
    #[arg(long, short)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mode: self.mode,
            headful: self.headful,
            execute: self.execute,
            max_attempts: self.max_attempts,
            interval_seconds: self.interval,
            webdriver_url: self.webdriver_url.clone(),
        }
    }
}

mod exit_codes {
    use std::process::ExitCode;

    /// A booking was made (or found, in dry run)
    pub fn done() -> ExitCode {
        ExitCode::from(0)
    }

    /// The run stopped without a booking
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// The configuration could not be loaded or is invalid
    pub fn config_error() -> ExitCode {
        ExitCode::from(2)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is normal.
    let dotenv = dotenvy::dotenv();

    let use_color = ui::use_color(cli.no_color);
    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet).with_ansi(use_color));

    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = match BotConfig::resolve(cli.config.as_deref(), cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("Error: {}", e);
            return exit_codes::config_error();
        }
    };

    let client = match WebDriverClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Cannot set up the WebDriver client");
            return exit_codes::config_error();
        }
    };

    let interrupt = Interrupt::new();
    if let Err(e) = interrupt.install_handler() {
        warn!(error = %e, "Could not install the Ctrl+C handler");
    }

    if config.headless {
        warn!("Running headless: there is no window to type the OTP into; use --headful");
    }
    if config.dry_run {
        info!("Dry run: the final booking button will not be clicked (use --execute)");
    }
    info!(
        mode = %config.mode,
        browser = ?config.browser,
        webdriver = %config.webdriver_url,
        mobile = %config.masked_mobile(),
        "Configuration loaded"
    );

    let mut controller = RetryController::new(config.run_config(), interrupt.token());
    let mut runner = BookingAttempt::new(client, config, interrupt.token());
    let report = controller.run(&mut runner).await;

    if !cli.quiet {
        let renderer = SummaryRenderer::new().with_color(use_color);
        print!("{}", renderer.render(&report));
    }

    if report.succeeded() {
        exit_codes::done()
    } else {
        exit_codes::failed()
    }
}
