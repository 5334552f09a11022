//! `esolve` CLI - resolve an episode identifier to playable streams
//!
//! Prints exactly one JSON object on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use esolve::{DigitRecognizer, Pipeline, Resolution, ResolverConfig, TesseractOcr, VERSION};

/// How many candidates/rejections the JSON diagnostics keep.
const DIAG_LIST_LIMIT: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "esolve")]
#[command(about = "Resolve a series episode to playable stream URLs")]
#[command(version)]
struct Cli {
    /// IMDb id (`tt6156584`)
    #[arg(long, conflicts_with = "tmdb")]
    imdb: Option<String>,

    /// TMDB id
    #[arg(long)]
    tmdb: Option<String>,

    #[arg(long, requires = "episode")]
    season: Option<u32>,

    #[arg(long, requires = "season")]
    episode: Option<u32>,

    /// Passthrough mode: return host URLs without host-specific solving
    #[arg(long)]
    mfp: bool,

    /// Movie request: print diagnostics only
    #[arg(long)]
    movie: bool,

    /// Debug logging on stderr (also `ESOLVE_DEBUG=1`)
    #[arg(long)]
    debug: bool,

    /// Config file (default `~/.config/esolve/config.toml`)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Identifier in pipeline form, `None` when no id was given.
    fn identifier(&self) -> Option<String> {
        let id = match (&self.imdb, &self.tmdb) {
            (Some(imdb), _) => imdb.clone(),
            (None, Some(tmdb)) => format!("tmdb:{tmdb}"),
            (None, None) => return None,
        };
        Some(match (self.season, self.episode) {
            (Some(season), Some(episode)) => format!("{id}:{season}:{episode}"),
            _ => id,
        })
    }
}

fn init_logging(debug: bool) {
    let debug = debug || std::env::var("ESOLVE_DEBUG").is_ok_and(|v| v == "1");
    let filter = if debug {
        EnvFilter::new("warn,esolve=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn base_diag(ocr_available: bool) -> Value {
    json!({
        "version": VERSION,
        "ocr_available": ocr_available,
        "cwd": std::env::current_dir().ok().map(|p| p.display().to_string()),
    })
}

fn render(cli: &Cli, resolution: &Resolution) -> Value {
    let diagnostics = &resolution.diagnostics;
    let trace = diagnostics.trace.truncated(DIAG_LIST_LIMIT);

    let streams: Vec<Value> = resolution
        .streams
        .iter()
        .map(|s| {
            json!({
                "url": s.url,
                "title": (!s.display_name.is_empty()).then_some(&s.display_name),
                "player": s.host,
                "lang": s.language,
            })
        })
        .collect();

    let mut diag = base_diag(diagnostics.ocr_available);
    if let Value::Object(map) = &mut diag {
        map.insert("streams_count".into(), json!(streams.len()));
        map.insert(
            "args".into(),
            json!({
                "imdb": cli.imdb,
                "tmdb": cli.tmdb,
                "season": cli.season,
                "episode": cli.episode,
                "mfp": cli.mfp,
            }),
        );
        map.insert("reason".into(), json!(diagnostics.reason));
        map.insert("title".into(), json!(diagnostics.title));
        map.insert("year".into(), json!(diagnostics.year));
        map.insert("metadata_error".into(), json!(diagnostics.metadata_error));
        map.insert("error".into(), json!(diagnostics.error));
        map.insert("imdb_tokens".into(), json!(trace.imdb_tokens));
        map.insert("matched_posts".into(), json!(trace.matched));
        map.insert("candidates".into(), json!(trace.candidates));
        map.insert("rejected".into(), json!(trace.rejected));
        map.insert("host_attempts".into(), json!(trace.host_attempts));
    }

    json!({ "streams": streams, "diag": diag })
}

async fn run(cli: &Cli) -> Result<Value> {
    let mut config = ResolverConfig::load(cli.config.as_deref()).context("loading config")?;
    if cli.mfp {
        config.passthrough = true;
    }

    if cli.movie {
        let ocr = TesseractOcr::with_binary(config.tesseract_path.clone());
        return Ok(json!({ "streams": [], "diag": base_diag(ocr.is_available()) }));
    }

    let Some(id) = cli.identifier() else {
        return Ok(json!({ "streams": [] }));
    };

    let pipeline = Pipeline::new(config).context("building pipeline")?;
    let resolution = pipeline.resolve(&id).await;
    Ok(render(cli, &resolution))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let output = match run(&cli).await {
        Ok(value) => value,
        Err(e) => json!({ "error": format!("{e:#}") }),
    };
    println!("{output}");
}
