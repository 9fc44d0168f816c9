//! factstreamd - procfs metrics sampling daemon.
//!
//! Samples process and system metrics from /proc on a fixed schedule and
//! streams them as flat fact lines to stdout or a file.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use factstream_core::format::{FactFormatter, JsonFormatter, NameValueFormatter, PathValueFormatter};
use factstream_core::registry::ProcRegistry;
use factstream_core::sampler::ExcludePolicy;
use factstream_core::sink::{FactSink, FileSink, StdoutSink};
use factstream_core::{Sampler, SamplerConfig, ScheduleOptions};

/// Output rendering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    NameValue,
    PathValue,
    Json,
}

/// Procfs metrics sampling daemon.
#[derive(Parser)]
#[command(name = "factstreamd", about = "Procfs metrics sampling daemon", version)]
struct Args {
    /// Sampling period in milliseconds.
    #[arg(short, long, default_value = "30000")]
    interval_ms: u64,

    /// Delay before the first cycle, in milliseconds.
    #[arg(long, default_value = "0")]
    initial_delay_ms: u64,

    /// Include filter: semicolon-separated glob patterns over object names.
    #[arg(long, default_value = "*:*")]
    include: String,

    /// Exclude filter: semicolon-separated glob patterns over object names.
    #[arg(long, default_value = "")]
    exclude: String,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Output format: name-value, path-value or json.
    #[arg(short, long, default_value = "name-value", value_parser = parse_format)]
    format: FormatKind,

    /// Write facts to this file instead of stdout.
    #[arg(short, long)]
    output: Option<String>,

    /// Per-attribute read budget in milliseconds. Unset reads inline.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// What to do with attributes whose reads fail: always, never or
    /// skip-timeouts.
    #[arg(long, default_value = "always", value_parser = parse_policy)]
    exclude_policy: ExcludePolicy,

    /// Wrap textual values in double quotes (name-value format only).
    #[arg(long)]
    quote_strings: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_format(s: &str) -> Result<FormatKind, String> {
    match s {
        "name-value" => Ok(FormatKind::NameValue),
        "path-value" => Ok(FormatKind::PathValue),
        "json" => Ok(FormatKind::Json),
        other => Err(format!(
            "unknown format '{}' (expected name-value, path-value or json)",
            other
        )),
    }
}

fn parse_policy(s: &str) -> Result<ExcludePolicy, String> {
    s.parse()
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("factstreamd={}", level).parse().unwrap())
        .add_directive(format!("factstream_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn make_formatter(args: &Args) -> Box<dyn FactFormatter> {
    match args.format {
        FormatKind::NameValue => {
            Box::new(NameValueFormatter::new().with_quoted_strings(args.quote_strings))
        }
        FormatKind::PathValue => Box::new(PathValueFormatter::new()),
        FormatKind::Json => Box::new(JsonFormatter::new()),
    }
}

fn make_sink(args: &Args) -> std::io::Result<Box<dyn FactSink>> {
    Ok(match &args.output {
        Some(path) => Box::new(FileSink::open(path)?),
        None => Box::new(StdoutSink::new()),
    })
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("factstreamd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}ms, include={}, exclude={}, proc={}",
        args.interval_ms,
        args.include,
        if args.exclude.is_empty() { "-" } else { args.exclude.as_str() },
        args.proc_path
    );

    let registry = Arc::new(ProcRegistry::new(&args.proc_path));
    let formatter = make_formatter(&args);
    let sink = match make_sink(&args) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to open output: {}", e);
            std::process::exit(1);
        }
    };

    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let mut sampler = Sampler::new(SamplerConfig {
        name: "ProcSample".to_string(),
        registry,
        formatter,
        sink,
        exclude_policy: args.exclude_policy,
        attr_timeout: args.timeout_ms.map(Duration::from_millis),
        source: vec!["factstream".to_string(), host],
    });

    let options = ScheduleOptions {
        period: Duration::from_millis(args.interval_ms),
        initial_delay: Duration::from_millis(args.initial_delay_ms),
    };
    if let Err(e) = sampler.open(&args.include, &args.exclude, options) {
        error!("Failed to open sampler: {}", e);
        std::process::exit(1);
    }
    info!("Sampling started");

    // Graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    // The scheduler samples on its own thread; the main thread only reports
    // counters periodically and waits for shutdown.
    let stats_every = Duration::from_secs(60);
    let mut last_stats = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
        if last_stats.elapsed() >= stats_every {
            last_stats = Instant::now();
            match sampler.context() {
                Ok(ctx) => info!(
                    "Stats: cycles={}, objects={}, metrics={} (last {}), errors={}, excluded={}",
                    ctx.sample_count(),
                    ctx.object_count(),
                    ctx.total_metric_count(),
                    ctx.last_metric_count(),
                    ctx.total_error_count(),
                    ctx.excluded_attr_count()
                ),
                Err(e) => warn!("Stats unavailable: {}", e),
            }
        }
    }

    info!("Shutting down...");
    let final_ctx = sampler.context().ok();
    sampler.close();
    if let Some(ctx) = final_ctx {
        info!(
            "Final: cycles={}, metrics={}, errors={}, excluded={}, actions={}",
            ctx.sample_count(),
            ctx.total_metric_count(),
            ctx.total_error_count(),
            ctx.excluded_attr_count(),
            ctx.total_action_count()
        );
    }
    info!("Shutdown complete");
}
