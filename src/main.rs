//! Cadence CLI
//!
//! Drift-free auto clicker with panic hotkeys and a corner failsafe.

use anyhow::{Context, Result};
use cadence_clicker::{
    config::Config,
    engine::{
        ClickKind, ControlEvent, Controller, ControllerOptions, FailsafeMonitor, HotkeyBridge,
        HotkeyCapability, IntervalParts, PanicCause, Phase, RequestSource, RunEnd,
        SessionConfig, SessionRequest,
    },
    input::{check_permission, CursorSource, EnigoSink, MouseButton, Position, SystemHotkeys},
    stats::{create_shared_log_with_persistence, log::read_persisted},
    SAFETY_NOTICE, VERSION,
};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, never, select, unbounded, Receiver};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = VERSION)]
#[command(about = "Drift-free auto clicker with panic hotkeys and a corner failsafe", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Click until stopped, the limit is reached, or a panic stop
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Arm the session but wait for the toggle key (or `s`) to start
        #[arg(long)]
        wait: bool,

        /// Do not register global hotkeys
        #[arg(long)]
        no_hotkeys: bool,

        /// Disable the top-left corner failsafe
        #[arg(long)]
        no_failsafe: bool,

        /// Store these settings as the new defaults
        #[arg(long)]
        save: bool,

        /// Keep running after a bounded run completes
        #[arg(long)]
        stay: bool,
    },
    /// Validate a session and show its rate without clicking
    Check {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Print the cursor position after a delay, for use with --at
    Pick {
        /// Seconds to wait before sampling
        #[arg(long, default_value = "3")]
        delay: u64,
    },
    /// Show settings, permissions and cumulative statistics
    Status,
    /// Show how to stop the clicker
    Safety,
    /// Show configuration
    Config {
        /// Restore the default configuration
        #[arg(long)]
        reset: bool,
    },
}

/// Session flags; anything omitted comes from the saved defaults.
#[derive(Args, Debug, Default)]
struct SessionArgs {
    /// Interval minutes
    #[arg(long)]
    minutes: Option<u64>,

    /// Interval seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Interval milliseconds
    #[arg(long)]
    millis: Option<u64>,

    /// Mouse button (left, right, middle)
    #[arg(long)]
    button: Option<MouseButton>,

    /// Double click on every tick
    #[arg(long)]
    double: bool,

    /// Stop after this many clicks
    #[arg(long)]
    limit: Option<u64>,

    /// Seconds to count down before the first click
    #[arg(long)]
    delay: Option<u64>,

    /// Click at a fixed position instead of the cursor, as X,Y
    #[arg(long, value_name = "X,Y")]
    at: Option<Position>,
}

impl SessionArgs {
    /// Overlay the flags on `defaults`.
    fn apply(&self, defaults: &SessionRequest) -> SessionRequest {
        let mut request = defaults.clone();
        if self.minutes.is_some() || self.seconds.is_some() || self.millis.is_some() {
            request.interval = IntervalParts::new(
                self.minutes.unwrap_or(0),
                self.seconds.unwrap_or(0),
                self.millis.unwrap_or(0),
            );
        }
        if let Some(button) = self.button {
            request.button = button;
        }
        if self.double {
            request.kind = ClickKind::Double;
        }
        if self.limit.is_some() {
            request.click_limit = self.limit;
        }
        if let Some(secs) = self.delay {
            request.start_delay = Duration::from_secs(secs);
        }
        if self.at.is_some() {
            request.target = self.at;
        }
        request
    }
}

/// Commands typed into the terminal while `run` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminalCommand {
    Toggle,
    Start,
    Stop,
    Panic,
    Acknowledge,
    Status,
    Help,
    Quit,
}

impl TerminalCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "t" | "toggle" => Some(Self::Toggle),
            "s" | "start" => Some(Self::Start),
            "x" | "stop" => Some(Self::Stop),
            "p" | "panic" => Some(Self::Panic),
            "a" | "ack" => Some(Self::Acknowledge),
            "" | "?" | "status" => Some(Self::Status),
            "h" | "help" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            session,
            wait,
            no_hotkeys,
            no_failsafe,
            save,
            stay,
        } => cmd_run(&session, wait, no_hotkeys, no_failsafe, save, stay),
        Commands::Check { session } => cmd_check(&session),
        Commands::Pick { delay } => cmd_pick(delay),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Safety => {
            cmd_safety();
            Ok(())
        }
        Commands::Config { reset } => cmd_config(reset),
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CADENCE_LOG")
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    })
}

fn cmd_run(
    args: &SessionArgs,
    wait: bool,
    no_hotkeys: bool,
    no_failsafe: bool,
    save: bool,
    stay: bool,
) -> Result<()> {
    println!("Cadence v{VERSION}");
    println!();

    let mut config = load_config();
    let request = args.apply(&config.defaults);
    let session = request.validate().context("Invalid session")?;

    if save {
        config.defaults = request.clone();
        config.save().context("Could not save defaults")?;
        println!("Saved as default session.");
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Session: {}", session.summary());
    println!("Target rate: ~{:.1} clicks/s", session.clicks_per_second());
    let progress_every = progress_stride(&session);

    let activity = create_shared_log_with_persistence(config.stats_path());
    let sink = Arc::new(EnigoSink::new());
    let controller = Controller::with_options(
        sink.clone(),
        ControllerOptions {
            double_click_gap: config.double_click_gap(),
            activity: Some(activity.clone()),
        },
    );
    let events = controller.subscribe();

    // Hotkeys
    let mut listener = SystemHotkeys::new(config.hotkeys.bindings);
    let bridge = if config.hotkeys.enabled && !no_hotkeys {
        let bridge = HotkeyBridge::attach(&controller, &mut listener);
        match bridge.capability() {
            HotkeyCapability::Global => println!(
                "Hotkeys: {} toggle, {} panic",
                config.hotkeys.bindings.toggle, config.hotkeys.bindings.panic
            ),
            HotkeyCapability::FocusOnly => {
                println!("Hotkeys: unavailable, use the terminal commands below")
            }
        }
        Some(bridge)
    } else {
        println!("Hotkeys: disabled");
        None
    };

    // Failsafe
    let failsafe = if config.failsafe.enabled && !no_failsafe {
        println!(
            "Failsafe: move the cursor into the top-left {}px corner to panic-stop",
            config.failsafe.corner_px
        );
        Some(FailsafeMonitor::spawn(
            controller.clone(),
            sink.clone() as Arc<dyn CursorSource>,
            config.failsafe.region(),
            config.failsafe.poll_period(),
        ))
    } else {
        println!("Failsafe: disabled");
        None
    };

    println!();
    print_help();
    println!();

    controller
        .stage(session.clone())
        .context("Controller stopped unexpectedly")?;
    if wait {
        println!("Armed. Toggle to start.");
    } else {
        controller
            .start(session)
            .context("Could not start clicking")?;
    }

    let mut commands = spawn_stdin_reader();
    let interrupts = ctrlc_channel();

    let mut running = true;
    while running {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    let completed = matches!(
                        event,
                        ControlEvent::RunEnded { end: RunEnd::Completed, .. }
                    );
                    print_event(&event, progress_every);
                    if completed && !stay {
                        running = false;
                    }
                }
                Err(_) => running = false,
            },
            recv(commands) -> command => match command {
                Ok(Some(command)) => {
                    running = handle_command(&controller, &request, command);
                }
                Ok(None) => println!("Unknown command (h for help)"),
                // Stdin closed; keep serving hotkeys until Ctrl+C
                Err(_) => commands = never(),
            },
            recv(interrupts) -> _ => {
                println!();
                println!("Interrupted.");
                let _ = controller.panic(PanicCause::Ui);
                running = false;
            }
        }
    }

    println!();
    println!("Shutting down...");
    if let Some(bridge) = bridge {
        bridge.detach();
    }
    if let Some(failsafe) = failsafe {
        failsafe.stop();
    }
    if controller.phase().is_active() {
        let _ = controller.stop(RequestSource::Ui);
    }
    controller.shutdown();

    if let Err(e) = activity.save() {
        eprintln!("Warning: Could not save activity stats: {e}");
    }

    println!();
    println!("{}", activity.summary());
    Ok(())
}

/// Returns `false` when the loop should exit.
fn handle_command(
    controller: &Controller,
    request: &SessionRequest,
    command: TerminalCommand,
) -> bool {
    let result = match command {
        TerminalCommand::Toggle => controller.toggle(RequestSource::Ui),
        TerminalCommand::Start => controller.start_request(request).map(|run| {
            println!("Started {run}");
        }),
        TerminalCommand::Stop => controller.stop(RequestSource::Ui),
        TerminalCommand::Panic => controller.panic(PanicCause::Ui),
        TerminalCommand::Acknowledge => controller.acknowledge(),
        TerminalCommand::Status => {
            print_state(controller);
            Ok(())
        }
        TerminalCommand::Help => {
            print_help();
            Ok(())
        }
        TerminalCommand::Quit => return false,
    };

    if let Err(e) = result {
        println!("{e}");
    }
    true
}

fn print_help() {
    println!("Commands: t toggle | s start | x stop | p panic | a acknowledge | q quit");
    println!("Press Ctrl+C to panic-stop and exit");
}

fn print_state(controller: &Controller) {
    let state = controller.snapshot();
    let remaining = match state.remaining() {
        Some(n) => format!(", {n} left"),
        None => String::new(),
    };
    println!(
        "State: {} | clicks: {}{}",
        state.phase, state.clicks_issued, remaining
    );
}

/// Print click progress roughly once a second.
fn progress_stride(session: &SessionConfig) -> u64 {
    let per_second = 1.0 / session.interval().as_secs_f64();
    (per_second.ceil() as u64).max(1)
}

fn print_event(event: &ControlEvent, progress_every: u64) {
    match event {
        ControlEvent::PhaseChanged { run, to, .. } => {
            let label = match to {
                Phase::Idle => "Idle".to_string(),
                Phase::Counting => "Counting down".to_string(),
                Phase::Running => "Clicking".to_string(),
                Phase::Stopping => "Stopping".to_string(),
                Phase::PanicStopped => {
                    "PANIC STOPPED (a or toggle to acknowledge)".to_string()
                }
            };
            match run {
                Some(run) => println!("[{run}] {label}"),
                None => println!("{label}"),
            }
        }
        ControlEvent::Countdown { remaining_secs, .. } => {
            println!("Starting in {remaining_secs}s...");
        }
        ControlEvent::ClickIssued {
            total, remaining, ..
        } => {
            let last = *remaining == Some(0);
            if total % progress_every == 0 || last {
                match remaining {
                    Some(left) => println!("Clicks: {total} ({left} left)"),
                    None => println!("Clicks: {total}"),
                }
            }
        }
        ControlEvent::RunEnded { run, end, clicks } => {
            println!("[{run}] Ended: {end} after {clicks} clicks");
        }
        ControlEvent::Notice(notice) => {
            println!("Notice: {notice}");
        }
    }
}

fn spawn_stdin_reader() -> Receiver<Option<TerminalCommand>> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(TerminalCommand::parse(&line)).is_err() {
                break;
            }
        }
    });
    rx
}

/// Set up Ctrl+C handler.
fn ctrlc_channel() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .expect("Error setting Ctrl+C handler");
    rx
}

fn cmd_check(args: &SessionArgs) -> Result<()> {
    let config = load_config();
    let request = args.apply(&config.defaults);
    let session = request.validate().context("Invalid session")?;

    println!("Session: {}", session.summary());
    println!("Target rate: ~{:.1} clicks/s", session.clicks_per_second());
    if let Some(limit) = session.click_limit() {
        let secs = session.interval().as_secs_f64() * limit.saturating_sub(1) as f64;
        println!("Estimated duration: {secs:.1}s after the start delay");
    }
    Ok(())
}

fn cmd_pick(delay: u64) -> Result<()> {
    for remaining in (1..=delay).rev() {
        println!("Sampling cursor in {remaining}s...");
        thread::sleep(Duration::from_secs(1));
    }

    let pos = EnigoSink::new()
        .position()
        .context("Could not read the cursor position")?;
    println!("Cursor at {pos}");
    println!("Use: cadence run --at {},{}", pos.x, pos.y);
    Ok(())
}

fn cmd_status() {
    let config = load_config();

    println!("Cadence Status");
    println!("==============");
    println!();

    let has_permission = check_permission();
    println!(
        "Global hotkey permission: {}",
        if has_permission {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    match config.defaults.validate() {
        Ok(session) => println!("  Default session: {}", session.summary()),
        Err(e) => println!("  Default session: invalid ({e})"),
    }
    println!(
        "  Hotkeys: {} (toggle {}, panic {})",
        if config.hotkeys.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.hotkeys.bindings.toggle,
        config.hotkeys.bindings.panic
    );
    println!(
        "  Failsafe: {} ({}px corner, every {}ms)",
        if config.failsafe.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.failsafe.corner_px,
        config.failsafe.poll_ms
    );
    println!("  Double click gap: {}ms", config.double_click_gap_ms);
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        match read_persisted(&stats_path) {
            Ok(stats) => {
                println!("Cumulative Statistics:");
                println!("  Runs started: {}", stats.runs_started);
                println!("  Runs completed: {}", stats.runs_completed);
                println!("  Clicks issued: {}", stats.clicks_issued);
                println!(
                    "  Panic stops: {} (failsafe: {})",
                    stats.panic_stops, stats.failsafe_trips
                );
                println!("  Injection failures: {}", stats.injection_failures);
                println!("  Last updated: {}", stats.last_updated.to_rfc3339());
            }
            Err(e) => eprintln!("Warning: Could not read statistics: {e}"),
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_safety() {
    println!("{SAFETY_NOTICE}");
}

fn cmd_config(reset: bool) -> Result<()> {
    let config = if reset {
        let config = Config::default();
        config.save().context("Could not write default config")?;
        println!("Configuration reset to defaults.");
        println!();
        config
    } else {
        load_config()
    };

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    let json = serde_json::to_string_pretty(&config).context("Could not render config")?;
    println!("{json}");
    Ok(())
}
