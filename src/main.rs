use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use quarry_core::{OutputFormat, QuarryConfig};

mod report;

#[derive(Parser)]
#[command(
    name = "quarry",
    version,
    about = "Local repo indexing and hybrid context retrieval for AI coding assistants",
    long_about = "Quarry keeps a local chunk index of your repository and answers natural-language\n\
                   questions with the most relevant snippets, ranked by BM25 fused with embedding\n\
                   similarity (falling back to BM25 alone when no embedding provider is running).\n\n\
                   Examples:\n  \
                     quarry index --path .              Build or refresh the chunk index\n  \
                     quarry search 'auth wiring?'       Top snippets for a question\n  \
                     quarry search 'retry logic' -k 5   Limit the result count\n  \
                     quarry config                      Show the effective configuration\n  \
                     quarry doctor                      Check setup and environment\n  \
                     quarry mcp --path .                Start the MCP server for IDE integration"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Build or incrementally refresh the chunk index
    #[command(long_about = "Build or incrementally refresh the chunk index.\n\n\
        Scans the tree, skipping excluded directories and non-text files, and\n\
        rechunks only files whose size or modification time changed. Unchanged\n\
        files are never re-read.\n\n\
        Examples:\n  quarry index\n  quarry index --path ../other-repo")]
    Index {
        /// Repository root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Retrieve the most relevant snippets for a question
    #[command(
        long_about = "Retrieve the most relevant snippets for a natural-language question.\n\n\
        Ranks every indexed chunk with BM25 and, when an embedding provider is\n\
        reachable, fuses in cosine similarity against the query embedding.\n\
        Provider failures silently degrade to BM25-only ranking.\n\n\
        Examples:\n  quarry search 'where is the config parsed?'\n  quarry search 'db pooling' -k 5 --refresh\n  quarry search 'auth middleware' --report"
    )]
    Search {
        /// The question to answer
        query: String,

        /// Repository root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum results to return (default: 12)
        #[arg(long, short, default_value = "12")]
        k: usize,

        /// Refresh the index before searching
        #[arg(long)]
        refresh: bool,

        /// Also write .quarry/CONTEXT_SNIPPETS.md with the results
        #[arg(long)]
        report: bool,
    },
    /// Show the effective configuration after all overrides
    #[command(long_about = "Show the effective configuration after all overrides.\n\n\
        Prints the merged result of built-in defaults, the project config file\n\
        (.quarry.toml, .quarry/config.toml, or quarry.toml), and QUARRY_*\n\
        environment variables, in that precedence order.")]
    Config {
        /// Repository root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Create a default .quarry.toml configuration file
    #[command(long_about = "Create a default .quarry.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .quarry.toml already exists.")]
    Init,
    /// Check your Quarry setup and environment
    #[command(long_about = "Check your Quarry setup and environment.\n\n\
        Runs diagnostics for the config file, the chunk index, and the\n\
        semantic search settings. Use --format json for machine-readable\n\
        output.")]
    Doctor,
    /// Start the MCP server for IDE integration
    #[command(
        long_about = "Start the MCP (Model Context Protocol) server for IDE integration.\n\n\
        Exposes refresh_index, search, open_file, list_files, and capabilities\n\
        over stdio transport for use by AI coding agents and IDE extensions.\n\n\
        Example:\n  quarry mcp --path /my/project"
    )]
    Mcp {
        /// Repository root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m⛏\x1b[0m \x1b[1mquarry\x1b[0m v{version} — local context retrieval for AI coding assistants\n");

        println!("Quick start:");
        println!("  \x1b[36mquarry init\x1b[0m                   Create a .quarry.toml config file");
        println!("  \x1b[36mquarry index\x1b[0m                  Build the chunk index for this repo");
        println!("  \x1b[36mquarry search 'auth wiring?'\x1b[0m  Ask for relevant snippets\n");

        println!("All commands:");
        println!("  \x1b[32mindex\x1b[0m     Build or refresh the chunk index");
        println!("  \x1b[32msearch\x1b[0m    Hybrid BM25 + embedding snippet retrieval");
        println!("  \x1b[32mconfig\x1b[0m    Show the effective configuration");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32mmcp\x1b[0m       Start MCP server for IDE integration");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("quarry v{version} — local context retrieval for AI coding assistants\n");

        println!("Quick start:");
        println!("  quarry init                   Create a .quarry.toml config file");
        println!("  quarry index                  Build the chunk index for this repo");
        println!("  quarry search 'auth wiring?'  Ask for relevant snippets\n");

        println!("All commands:");
        println!("  index     Build or refresh the chunk index");
        println!("  search    Hybrid BM25 + embedding snippet retrieval");
        println!("  config    Show the effective configuration");
        println!("  doctor    Check your setup and environment");
        println!("  mcp       Start MCP server for IDE integration");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'quarry <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(format: OutputFormat, use_color: bool) -> Result<()> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    let config = QuarryConfig::load(&cwd);
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    match QuarryConfig::find_file(&cwd) {
        Some(path) => checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", path.display()),
        )),
        None => checks.push(CheckResult::fail(
            "config_file",
            "no config file found",
            "run 'quarry init' to create a default .quarry.toml",
        )),
    }

    // 2. Chunk index
    let index_path = quarry_index::store::store_path(&cwd);
    if index_path.exists() {
        let detail = match rusqlite::Connection::open_with_flags(
            &index_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        ) {
            Ok(conn) => {
                let chunks: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
                    .unwrap_or(0);
                let files: i64 = conn
                    .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
                    .unwrap_or(0);
                format!("exists ({chunks} chunks from {files} files)")
            }
            Err(_) => "exists".into(),
        };
        checks.push(CheckResult::pass("chunk_index", detail));
    } else {
        checks.push(CheckResult::info(
            "chunk_index",
            "not found (run 'quarry index' to create)",
        ));
    }

    // 3. Semantic search settings
    if config.semantic.enabled {
        checks.push(CheckResult::info(
            "semantic_search",
            format!(
                "enabled: {} (model: {}, batch: {}, timeout: {}s)",
                config.semantic.url,
                config.semantic.model,
                config.semantic.batch,
                config.semantic.timeout,
            ),
        ));
    } else {
        checks.push(CheckResult::info(
            "semantic_search",
            "disabled (ranking is BM25-only)",
        ));
    }

    // 4. Fusion weights
    let w = (config.semantic.weight_bm25, config.semantic.weight_emb);
    if w.0 < 0.0 || w.1 < 0.0 {
        checks.push(CheckResult::fail(
            "fusion_weights",
            format!("bm25={}, emb={}", w.0, w.1),
            "weights should be non-negative",
        ));
    } else {
        checks.push(CheckResult::pass(
            "fusion_weights",
            format!("bm25={}, emb={}", w.0, w.1),
        ));
    }

    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Quarry v{version} — Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn index_spinner(path: &std::path::Path) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_message(format!("Indexing {} ...", path.display()));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn print_hits(hits: &[quarry_core::ContextHit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(hits).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if hits.is_empty() {
                println!("No results found.");
            } else {
                println!("# Search Results\n");
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "## {}. `{}:{}-{}` (score: {:.4})\n\n```text\n{}\n```\n",
                        i + 1,
                        hit.path,
                        hit.start_line,
                        hit.end_line,
                        hit.score,
                        hit.snippet,
                    );
                }
            }
        }
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No results found.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. {}:{}-{} (score: {:.4})",
                        i + 1,
                        hit.path,
                        hit.start_line,
                        hit.end_line,
                        hit.score,
                    );
                    // Show a snippet preview (first 3 lines)
                    let preview: String = hit
                        .snippet
                        .lines()
                        .take(3)
                        .map(|l| format!("   {l}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{preview}\n");
                }
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Quarry Configuration
# All values shown are the built-in defaults. Environment variables
# (QUARRY_CHUNK_LINES, QUARRY_EMBED_URL, QUARRY_EMBED_MODEL, ...) override
# anything set here.

# Lines per chunk
# chunk_lines = 120

# Directory names skipped entirely while scanning
# exclude_dirs = [".git", ".quarry", "node_modules", ".venv", "dist", "build"]

# Extensions indexed without a text probe
# text_ext = [".rs", ".py", ".ts", ".js", ".go", ".md", ".toml", ".yml"]

[semantic]
# enabled = true
# url = "http://127.0.0.1:11434"
# model = "nomic-embed-text"
# timeout = 10.0
# batch = 32
# weight_bm25 = 0.5
# weight_emb = 0.5
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
    }

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Index { ref path }) => {
            let config = QuarryConfig::load(path);
            if cli.verbose {
                match QuarryConfig::find_file(path) {
                    Some(f) => eprintln!("config: {}", f.display()),
                    None => eprintln!("config: built-in defaults"),
                }
            }

            let spinner = index_spinner(path);
            let started = Instant::now();
            let summary = quarry_index::indexer::refresh_index(path, &config).into_diagnostic()?;
            let elapsed = started.elapsed().as_secs_f64();
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            match cli.format {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "added": summary.added,
                        "updated": summary.updated,
                        "storeLocation": summary.store_location,
                        "elapsedSeconds": (elapsed * 100.0).round() / 100.0,
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Index Refresh\n");
                    println!("- **Added:** {}", summary.added);
                    println!("- **Updated:** {}", summary.updated);
                    println!("- **Store:** `{}`", summary.store_location);
                    println!("- **Elapsed:** {elapsed:.2}s");
                }
                OutputFormat::Text => {
                    println!(
                        "Indexed: {} added, {} updated in {elapsed:.2}s",
                        summary.added, summary.updated,
                    );
                    println!("Store: {}", summary.store_location);
                }
            }
        }
        Some(Command::Search {
            ref query,
            ref path,
            k,
            refresh,
            report,
        }) => {
            let config = QuarryConfig::load(path);

            if refresh {
                let spinner = index_spinner(path);
                let summary = quarry_index::indexer::refresh_index(path, &config).into_diagnostic()?;
                if let Some(pb) = spinner {
                    pb.finish_and_clear();
                }
                eprintln!(
                    "Index refreshed: {} added, {} updated",
                    summary.added, summary.updated,
                );
            }

            let hits = quarry_search::search(path, query, k, &config).await.into_diagnostic()?;
            print_hits(&hits, cli.format)?;

            if report {
                let out = report::write_report(path, query, &hits).into_diagnostic()?;
                eprintln!("Report written to {}", out.display());
            }
        }
        Some(Command::Config { ref path }) => {
            let config = QuarryConfig::load(path);
            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    println!("# Effective Configuration\n");
                    println!("| Option | Value |");
                    println!("|--------|-------|");
                    println!("| chunk_lines | {} |", config.chunk_lines);
                    println!("| exclude_dirs | {} |", config.exclude_dirs.join(", "));
                    println!("| text_ext | {} |", config.text_ext.join(", "));
                    println!("| semantic.enabled | {} |", config.semantic.enabled);
                    println!("| semantic.url | {} |", config.semantic.url);
                    println!("| semantic.model | {} |", config.semantic.model);
                    println!("| semantic.timeout | {} |", config.semantic.timeout);
                    println!("| semantic.batch | {} |", config.semantic.batch);
                    println!("| semantic.weight_bm25 | {} |", config.semantic.weight_bm25);
                    println!("| semantic.weight_emb | {} |", config.semantic.weight_emb);
                }
                OutputFormat::Text => {
                    match QuarryConfig::find_file(path) {
                        Some(f) => println!("Config file: {}", f.display()),
                        None => println!("Config file: none (built-in defaults)"),
                    }
                    println!("chunk_lines: {}", config.chunk_lines);
                    println!("exclude_dirs: {}", config.exclude_dirs.join(", "));
                    println!("text_ext: {}", config.text_ext.join(", "));
                    println!("semantic.enabled: {}", config.semantic.enabled);
                    println!("semantic.url: {}", config.semantic.url);
                    println!("semantic.model: {}", config.semantic.model);
                    println!("semantic.timeout: {}", config.semantic.timeout);
                    println!("semantic.batch: {}", config.semantic.batch);
                    println!("semantic.weight_bm25: {}", config.semantic.weight_bm25);
                    println!("semantic.weight_emb: {}", config.semantic.weight_emb);
                }
            }
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".quarry.toml");
            if path.exists() {
                miette::bail!(".quarry.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .quarry.toml with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(cli.format, use_color)?;
        }
        Some(Command::Mcp { path }) => {
            quarry_mcp::server::run_server(path).await.into_diagnostic()?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quarry", &mut std::io::stdout());
        }
    }

    Ok(())
}
