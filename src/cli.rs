use crate::{
    adapters::LogRouter,
    config::Config,
    engine::{Engine, tools::ToolEngine},
    event::{self, ChannelSink, EventRx, ProgressSink},
    host::TextSurface,
    job::{Dispatcher, JobHandle},
    key::OperationKind,
    operations::{self, OpEnv},
    registry::Registry,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdfp-progress")]
#[command(about = "Run OCR, crop and TTS jobs on PDFs with live per-job progress")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdfp-progress.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that every configured tool can be executed.
    Doctor {},
    /// Print the page count of a PDF.
    Probe {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run jobs concurrently and show their progress.
    Run {
        #[arg(long)]
        ocr: Vec<PathBuf>,
        #[arg(long)]
        crop: Vec<PathBuf>,
        #[arg(long)]
        tts: Vec<PathBuf>,
        /// Do not draw the progress panel.
        #[arg(long)]
        no_panel: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let router = LogRouter::new();
    let _guard = init_logging(&args, &cfg, &router)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Probe { input } => probe(&cfg, input),
        Command::Run {
            ocr,
            crop,
            tts,
            no_panel,
        } => {
            let mut jobs = Vec::new();
            jobs.extend(ocr.iter().map(|p| (OperationKind::Ocr, p.clone())));
            jobs.extend(crop.iter().map(|p| (OperationKind::Crop, p.clone())));
            jobs.extend(tts.iter().map(|p| (OperationKind::Tts, p.clone())));
            run(cfg, router, jobs, !*no_panel)
        }
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    let default = PathBuf::from("pdfp-progress.toml");
    if default.exists() {
        Config::load(&default)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(args: &Args, cfg: &Config, router: &LogRouter) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| cfg.logging.level.clone());
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // stderr: stdout carries JSON results.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter())
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = resolve_log_path(cfg) {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(filter())
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // Unfiltered: adapters need scoped records at every level.
    tracing_subscriber::registry()
        .with(router.clone())
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("pdfp-progress.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = ToolEngine::new(cfg)?;
    let diag = engine.doctor();
    for d in diag.iter().filter(|d| !d.ok) {
        warn!("{} not usable: {}", d.tool, d.error.as_deref().unwrap_or("unknown"));
    }
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn probe(cfg: &Config, input: &Path) -> Result<()> {
    let engine = ToolEngine::new(cfg)?;
    let probe = crate::probe::probe_pdf(cfg, &engine, input)?;
    println!("{}", serde_json::to_string_pretty(&probe)?);
    Ok(())
}

fn run(cfg: Config, router: LogRouter, jobs: Vec<(OperationKind, PathBuf)>, panel: bool) -> Result<()> {
    if jobs.is_empty() {
        return Err(anyhow!("nothing to do: pass --ocr, --crop or --tts"));
    }

    let engine: Arc<dyn Engine> = Arc::new(ToolEngine::new(&cfg)?);
    let env = OpEnv {
        cfg: Arc::new(cfg),
        engine,
        router,
    };

    let (tx, rx) = event::channel();
    let sink: Arc<dyn ProgressSink> = Arc::new(ChannelSink::new(tx));
    let dispatcher = Dispatcher::new(sink);

    let started = now_rfc3339();
    let mut handles: Vec<JobHandle> = Vec::new();
    for (kind, input) in &jobs {
        match operations::start(&dispatcher, &env, *kind, input) {
            Ok(h) => handles.push(h),
            Err(err) => warn!("skipping {kind} {}: {err:#}", input.display()),
        }
    }
    // The channel closes once every job has released its sender.
    drop(dispatcher);

    let mut registry = Registry::new(env.cfg.panel.chrome);
    let mut surface = TextSurface::new(env.cfg.panel.width, env.cfg.panel.height);
    let (w, h) = (surface.width(), surface.height());
    surface.resize(w, h, &mut registry);

    let draw = panel && std::io::stderr().is_terminal();
    let tick = Duration::from_millis(env.cfg.panel.redraw_ms.max(10));
    let mut painter = Painter::default();
    drive(&rx, &mut registry, tick, |reg| {
        if draw {
            painter.paint(&surface.render(reg));
        } else {
            debug!(
                "progress {}",
                serde_json::to_string(&reg.snapshot()).unwrap_or_default()
            );
        }
    });

    let mut summary = Vec::new();
    for h in handles {
        let key = h.key().to_string();
        let outcome = h.join();
        summary.push(serde_json::json!({ "key": key, "outcome": outcome }));
    }
    info!("all jobs finished");

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "started": started,
            "finished": now_rfc3339(),
            "jobs": summary,
        }))?
    );
    Ok(())
}

/// Applies events until every producer is gone, calling `on_change` after
/// each batch that touched the registry.
pub fn drive<F: FnMut(&Registry)>(rx: &EventRx, registry: &mut Registry, tick: Duration, mut on_change: F) {
    loop {
        match rx.recv_timeout(tick) {
            Ok(ev) => {
                registry.apply(ev);
                registry.pump(rx);
                on_change(registry);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    on_change(registry);
}

/// Repaints the panel in place at the bottom of stderr.
#[derive(Default)]
struct Painter {
    drawn: usize,
}

impl Painter {
    fn paint(&mut self, rows: &[String]) {
        let mut err = std::io::stderr().lock();
        if self.drawn > 0 {
            let _ = write!(err, "\x1b[{}A", self.drawn);
        }
        let _ = write!(err, "\r\x1b[J");
        for row in rows {
            let _ = writeln!(err, "{row}");
        }
        let _ = err.flush();
        self.drawn = rows.len();
    }
}
