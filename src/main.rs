use std::fmt::Write;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use quarry_core::bootstrap::{health_check, resolve_config_path};
use quarry_core::{Config, RagEngine};
use quarry_retrieval::hierarchy::PARENT_ID_KEY;
use quarry_retrieval::{QueryInput, ScoreKind, SearchOutcome};

const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Parser)]
#[command(name = "quarry", version, about = "Hybrid retrieval over local documents")]
struct Cli {
    /// TOML configuration file (default: `QUARRY_CONFIG` or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank passages from FILES for a query
    Search(QueryArgs),
    /// Answer a question using only passages from FILES
    Ask(QueryArgs),
    /// Show the child chunks matched in the parent/child store
    Children {
        #[command(flatten)]
        args: QueryArgs,
        /// Number of children to show
        #[arg(short, long, default_value_t = 4)]
        k: usize,
    },
    /// Print the query variants produced by expansion
    Expand {
        #[arg(short, long)]
        query: String,
    },
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Query text, or JSON such as {"question": "..."}
    #[arg(short, long)]
    query: String,

    /// Text or Markdown files to index first
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let engine = RagEngine::from_config(&config)?;
    run(&engine, cli.command).await
}

async fn run(engine: &RagEngine, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search(args) => {
            index(engine, &args.files).await?;
            let outcome = engine.search(&QueryInput::parse(&args.query)).await?;
            print!("{}", render_outcome(&outcome));
        }
        Command::Ask(args) => {
            index(engine, &args.files).await?;
            let answer = engine.answer(&QueryInput::parse(&args.query)).await?;
            println!("{}\n", answer.text);
            print!("{}", render_outcome(&answer.outcome));
        }
        Command::Children { args, k } => {
            index(engine, &args.files).await?;
            let query = QueryInput::parse(&args.query);
            let children = engine.children(query.as_str(), k).await?;
            for (i, (child, score)) in children.iter().enumerate() {
                println!(
                    "{:>2}. {score:.4}  parent={}",
                    i + 1,
                    child.meta_str(PARENT_ID_KEY).unwrap_or("?")
                );
                println!("    {}", preview(&child.content));
            }
        }
        Command::Expand { query } => {
            for variant in engine.expand(&query).await {
                println!("{variant}");
            }
        }
    }
    Ok(())
}

async fn index(engine: &RagEngine, files: &[PathBuf]) -> anyhow::Result<()> {
    if files.is_empty() {
        bail!("no input files given");
    }
    health_check(engine.provider()).await;
    let documents = RagEngine::load_files(files).await?;
    engine.ingest(&documents).await?;
    Ok(())
}

fn render_outcome(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    if outcome.variants.len() > 1 {
        let _ = writeln!(out, "queries: {}", outcome.variants.join(" | "));
    }
    let kind = match outcome.score_kind {
        ScoreKind::Fused => "fused",
        ScoreKind::Reranked => "reranked",
    };
    let _ = writeln!(out, "{} results ({kind} scores)", outcome.results.len());
    for (i, result) in outcome.results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {:.4}  {}  {}",
            i + 1,
            result.score,
            result.fingerprint.short(),
            result.document.source().unwrap_or("unknown")
        );
        let _ = writeln!(out, "    {}", preview(&result.document.content));
    }
    out
}

/// Single-line excerpt with collapsed whitespace.
fn preview(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use quarry_memory::Document;
    use quarry_retrieval::ScoredDocument;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_with_files() {
        let cli = Cli::try_parse_from([
            "quarry",
            "--config",
            "q.toml",
            "search",
            "--query",
            "borrow checker",
            "a.md",
            "b.txt",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("q.toml")));
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "borrow checker");
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn parses_children_with_k() {
        let cli = Cli::try_parse_from(["quarry", "children", "-q", "x", "-k", "7", "a.md"]).unwrap();
        assert!(matches!(cli.command, Command::Children { k: 7, .. }));
    }

    #[test]
    fn query_is_required() {
        assert!(Cli::try_parse_from(["quarry", "ask", "a.md"]).is_err());
    }

    #[test]
    fn preview_collapses_and_truncates() {
        assert_eq!(preview("a\n\n  b\tc"), "a b c");
        let long = "word ".repeat(100);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= PREVIEW_CHARS + 3);
    }

    #[test]
    fn outcome_lists_variants_scores_and_sources() {
        let document = Document::new("Traits describe shared behavior.")
            .with_metadata("source", "notes.md");
        let outcome = SearchOutcome {
            variants: vec!["traits".into(), "shared behavior".into()],
            results: vec![ScoredDocument {
                fingerprint: document.fingerprint(),
                document,
                score: 0.75,
            }],
            score_kind: ScoreKind::Reranked,
        };
        let rendered = render_outcome(&outcome);
        assert!(rendered.starts_with("queries: traits | shared behavior\n"));
        assert!(rendered.contains("1 results (reranked scores)"));
        assert!(rendered.contains(" 1. 0.7500  "));
        assert!(rendered.contains("notes.md"));
    }
}
