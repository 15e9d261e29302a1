//! Docsearch entry point
//!
//! - `index`: embed every Markdown page and publish the artifact into the built site
//! - `query`: rank the built site's pages against one query
//! - `interactive`: search as you type, one stdin line per edit

use clap::{Parser, Subcommand};
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsearch_cli::{
    render_results, run_index, run_interactive, run_query, IndexArgs, InteractiveArgs, QueryArgs,
};

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Semantic search for statically generated documentation sites")]
#[command(version)]
struct Args {
    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the embeddings artifact
    Index(IndexArgs),
    /// Run a single query against a built site
    Query(QueryArgs),
    /// Read queries from stdin as they are typed
    Interactive(InteractiveArgs),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_filter = if args.verbose {
        "docsearch=debug,docsearch_cli=debug,docsearch_index=debug"
    } else {
        "docsearch=info,docsearch_cli=info,docsearch_index=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args.command).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Index(args) => {
            if run_index(&args).await?.is_none() {
                tracing::debug!("No artifact written");
            }
        }
        Command::Query(args) => {
            let results = run_query(&args).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(render_results(&results, args.json)?.as_bytes())?;
            stdout.flush()?;
        }
        Command::Interactive(args) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_interactive(&args, stdin, tokio::io::stdout()).await?;
        }
    }
    Ok(())
}
