use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sitepick_core::classify::{classify_offline, HybridClassifier};
use sitepick_core::run::DomainRun;
use sitepick_core::score::{Profile, Scorer};
use sitepick_core::shape::{normalize_exact, normalize_shape};
use sitepick_core::{clean_domain, host_of, ChatBackend, SearchHit, SearchProvider};
use sitepick_local::llm::LlmBatchClassifier;
use sitepick_local::ollama::OllamaClient;
use sitepick_local::openai_compat::OpenAiCompatClient;
use sitepick_local::search::{BraveSearchProvider, SerperSearchProvider};
use sitepick_local::{Mode, Pipeline, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod output;
use output::Format;

#[derive(Parser, Debug)]
#[command(name = "sitepick")]
#[command(about = "Pick SEO-significant listing pages for a domain out of search results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search each domain and print its listing pages.
    Collect(CollectCmd),
    /// Label URLs (rule stages, optionally an LLM for the rest).
    Classify(ClassifyCmd),
    /// Score one URL and show its structural keys (json).
    Score(ScoreCmd),
    /// Report which providers and chat backends are configured, with chat
    /// endpoints and models (json; no secrets).
    Doctor,
    /// Print version info.
    Version(VersionCmd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Serper,
    Brave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassifierArg {
    /// Rule stages only; undecided URLs become POST.
    None,
    OpenaiCompat,
    Ollama,
}

#[derive(clap::Args, Debug)]
struct CollectCmd {
    /// Domains (`example.com`, `https://example.com/`).
    #[arg(required = true)]
    domains: Vec<String>,
    /// Max results fetched per domain (also the per-domain output cap).
    #[arg(short = 'n', long)]
    num: Option<usize>,
    #[arg(short = 'f', long, value_enum, default_value = "table")]
    format: Format,
    /// Also write `# domain` / URL lines to this file.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Keep every deduplicated hit regardless of label or score.
    #[arg(long)]
    no_filter: bool,
    /// site|brand
    #[arg(long)]
    mode: Option<Mode>,
    /// Scoring preset: general|brand (defaults to the mode's preset).
    #[arg(long)]
    profile: Option<Profile>,
    /// Score-only filtering for site mode: keep hits scoring at least this.
    #[arg(long)]
    min_score: Option<i64>,
    #[arg(long)]
    top_n: Option<usize>,
    /// Brand for brand mode (skips brand inference).
    #[arg(long)]
    brand: Option<String>,
    /// Keep one hit per structural signature.
    #[arg(long)]
    compact: bool,
    #[arg(long, value_enum, default_value = "serper", env = "SITEPICK_PROVIDER")]
    provider: ProviderArg,
    #[arg(long, value_enum, default_value = "none", env = "SITEPICK_CLASSIFIER")]
    classifier: ClassifierArg,
    /// Model override for the openai-compat backend.
    #[arg(long)]
    model: Option<String>,
    /// JSON pipeline config; flags override its fields.
    #[arg(long, env = "SITEPICK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ClassifyCmd {
    urls: Vec<String>,
    /// Read URLs (one per line) from a file, or `-` for stdin.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "none", env = "SITEPICK_CLASSIFIER")]
    classifier: ClassifierArg,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value_t = 20)]
    batch_size: usize,
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
    /// Disable the repeated-shape POST rule.
    #[arg(long)]
    no_shape_rule: bool,
}

#[derive(clap::Args, Debug)]
struct ScoreCmd {
    url: String,
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    snippet: String,
    #[arg(long, default_value = "general")]
    profile: Profile,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Optional `KEY=VALUE` file named by `SITEPICK_ENV_FILE`. Never overrides
/// variables already set in the process environment.
fn load_env_file() {
    let Ok(p) = std::env::var("SITEPICK_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// `SITEPICK_LOG`, else `RUST_LOG`, else `warn`; always to stderr.
fn init_tracing() {
    let filter = std::env::var("SITEPICK_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("sitepick/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}

fn build_classifier(
    kind: ClassifierArg,
    http: &reqwest::Client,
    model: Option<String>,
    batch_size: usize,
    timeout_ms: u64,
) -> Result<HybridClassifier> {
    let backend: Arc<dyn ChatBackend> = match kind {
        ClassifierArg::None => return Ok(HybridClassifier::rules_only().with_batch_size(batch_size)),
        ClassifierArg::OpenaiCompat => Arc::new(OpenAiCompatClient::from_env(http.clone(), model)?),
        ClassifierArg::Ollama => Arc::new(OllamaClient::from_env(http.clone())?),
    };
    let llm = LlmBatchClassifier::new(backend, timeout_ms);
    tracing::info!(backend = llm.backend_name(), batch_size, timeout_ms, "external classifier enabled");
    Ok(HybridClassifier::new(Arc::new(llm))
        .with_batch_size(batch_size)
        .with_timeout(Duration::from_millis(timeout_ms)))
}

fn collect_config(args: &CollectCmd) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = args.num {
        cfg.num = n;
    }
    if args.no_filter {
        cfg.filter = false;
    }
    if let Some(m) = args.mode {
        cfg.mode = m;
    }
    if let Some(p) = args.profile {
        cfg.profile = Some(p);
    }
    if args.min_score.is_some() {
        cfg.min_score = args.min_score;
    }
    if args.top_n.is_some() {
        cfg.top_n = args.top_n;
    }
    if args.brand.is_some() {
        cfg.brand = args.brand.clone();
    }
    if args.compact {
        cfg.compact_shapes = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Cleaned, non-empty, first occurrence wins.
fn unique_domains(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for d in raw {
        let c = clean_domain(d);
        if !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

async fn run_collect(args: CollectCmd) -> Result<()> {
    let cfg = collect_config(&args)?;
    let domains = unique_domains(&args.domains);
    if domains.is_empty() {
        anyhow::bail!("no usable domains in {:?}", args.domains);
    }

    let http = http_client()?;
    let provider: Arc<dyn SearchProvider> = match args.provider {
        ProviderArg::Serper => Arc::new(SerperSearchProvider::from_env(http.clone())?),
        ProviderArg::Brave => Arc::new(BraveSearchProvider::from_env(http.clone())?),
    };
    let classifier = if cfg.needs_external_classifier() {
        build_classifier(args.classifier, &http, args.model.clone(), cfg.batch_size, cfg.batch_timeout_ms)?
    } else {
        HybridClassifier::rules_only()
    };
    tracing::info!(provider = provider.name(), classifier = ?classifier, mode = %cfg.mode, "starting collect");

    let pipeline = Pipeline::new(provider, classifier, cfg);
    let reports = pipeline.evaluate(&domains).await;

    for r in &reports {
        match &r.error {
            Some(e) => eprintln!("[ERR] {}: {e}", r.domain),
            None => eprintln!("[OK] {}: {}", r.domain, r.hits.len()),
        }
    }

    print!("{}", output::render(&reports, args.format));
    if args.format == Format::Json {
        println!();
    }

    if let Some(path) = &args.output {
        std::fs::write(path, output::render_file(&reports))
            .with_context(|| format!("write {}", path.display()))?;
        eprintln!("[OK] saved: {}", path.display());
    }

    let total: usize = reports.iter().map(|r| r.hits.len()).sum();
    eprintln!("total {total} urls");
    Ok(())
}

fn read_urls(args: &ClassifyCmd) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(p) = &args.file {
        let txt = if p.as_os_str() == "-" {
            std::io::read_to_string(std::io::stdin()).context("read stdin")?
        } else {
            std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?
        };
        urls.extend(
            txt.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(urls)
}

/// One JSON line per accepted URL. URLs are grouped per host so each host
/// gets its own run context.
async fn run_classify(args: ClassifyCmd) -> Result<()> {
    let urls = read_urls(&args)?;
    if urls.is_empty() {
        anyhow::bail!("no URLs given (pass them as arguments or via --file)");
    }
    let http = http_client()?;
    let classifier = build_classifier(args.classifier, &http, args.model.clone(), args.batch_size, args.timeout_ms)?;
    let threshold = if args.no_shape_rule {
        None
    } else {
        Some(sitepick_core::run::DEFAULT_PATTERN_THRESHOLD)
    };

    let mut groups: Vec<(String, Vec<SearchHit>)> = Vec::new();
    for u in urls {
        let Some(host) = host_of(&u) else {
            tracing::warn!(url = %u, "skipping malformed url");
            continue;
        };
        let hit = SearchHit::new(u, "", "");
        match groups.iter_mut().find(|(h, _)| *h == host) {
            Some((_, v)) => v.push(hit),
            None => groups.push((host, vec![hit])),
        }
    }

    for (host, hits) in groups {
        let mut run = DomainRun::new(host).with_pattern_threshold(threshold);
        let accepted: Vec<String> = run.ingest(hits).into_iter().map(|h| h.url).collect();
        let decisions = classifier.classify(&accepted, Some(&run)).await;
        for (url, d) in accepted.iter().zip(decisions) {
            let line = serde_json::json!({
                "url": url,
                "label": d.label,
                "stage": d.stage.as_str(),
                "shape": normalize_shape(url).as_str(),
            });
            println!("{line}");
        }
    }
    Ok(())
}

fn run_score(args: ScoreCmd) {
    let scorer = Scorer::for_profile(args.profile);
    let decision = classify_offline(&args.url, None);
    let v = serde_json::json!({
        "url": args.url,
        "profile": args.profile,
        "score": scorer.score(&args.url, &args.title, &args.snippet),
        "label": decision.label,
        "stage": decision.stage.as_str(),
        "shape": normalize_shape(&args.url).as_str(),
        "exact": normalize_exact(&args.url),
    });
    println!("{v}");
}

fn run_doctor() -> Result<()> {
    let http = http_client()?;
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": true,
        "providers": {
            "serper": SerperSearchProvider::from_env(http.clone()).is_ok(),
            "brave": BraveSearchProvider::from_env(http.clone()).is_ok(),
        },
        "chat": {
            "openai_compat": match OpenAiCompatClient::from_env(http.clone(), None) {
                Ok(c) => serde_json::json!({"configured": true, "base_url": c.base_url(), "model": c.model()}),
                Err(_) => serde_json::json!({"configured": false}),
            },
            "ollama": match OllamaClient::from_env(http) {
                Ok(c) => serde_json::json!({"configured": true, "base_url": c.base_url(), "model": c.model()}),
                Err(_) => serde_json::json!({"configured": false}),
            },
        },
    });
    println!("{v}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect(args) => run_collect(args).await?,
        Commands::Classify(args) => run_classify(args).await?,
        Commands::Score(args) => run_score(args),
        Commands::Doctor => run_doctor()?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "sitepick",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("sitepick {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
