//! # Research Tree CLI (`rtree`)
//!
//! Grows a hierarchical research article from a single query: apply an
//! outline, expand nodes with retrieved evidence, deepen them into
//! sub-sections, write prose, and render Markdown.
//!
//! ## Usage
//!
//! ```bash
//! rtree --config ./config/rtree.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rtree init` | Create the SQLite database and run schema migrations |
//! | `rtree create "<query>"` | Start a new research tree; prints its session id |
//! | `rtree sessions` | List research trees |
//! | `rtree show <session>` | Print the tree as JSON |
//! | `rtree render <session>` | Print the tree as Markdown |
//! | `rtree outline <session> <file>` | Apply a JSON outline under the root |
//! | `rtree ask <session> <q>...` | Register questions |
//! | `rtree expand <session> <node>` | Retrieve evidence and generate questions |
//! | `rtree deepen <session> <node>` | Split novel questions into sub-sections |
//! | `rtree write <session> <node>` | Write a section's content |
//! | `rtree complete <session> <node>` | Write a section's summary and conclusion |
//! | `rtree rank <session>` | Re-stamp rank and level and print the outline |
//!
//! Nodes are addressed by UUID, `root`, a 0-based top-level section index,
//! or a dotted rank such as `1.2.1`.
//!
//! ## Examples
//!
//! ```bash
//! rtree init
//! SESSION=$(rtree create "How do black holes form and evaporate?")
//! rtree outline $SESSION ./outline.json
//! rtree expand $SESSION 0 --top-k 8
//! rtree deepen $SESSION 0
//! rtree render $SESSION > article.md
//! ```

mod collaborators;
mod config;
mod db;
mod grow_cmd;
mod logging;
mod migrate;
mod session_cmd;
mod sqlite_store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Research Tree CLI: grow a hierarchical research article from retrieved
/// evidence.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rtree.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rtree",
    about = "Research Tree: grow a hierarchical research article from retrieved evidence",
    version,
    long_about = "Research Tree keeps a research article as a tree of sections. Each section \
    collects evidence chunks and questions; clusters of novel questions become sub-sections. \
    Retrieval and text generation are delegated to an HTTP collaborator service."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rtree.toml`.
    #[arg(long, global = true, default_value = "./config/rtree.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Create a research tree for a query and print its session id.
    Create {
        /// The research query; becomes the root title.
        query: String,
    },

    /// List research trees, oldest first.
    Sessions,

    /// Print a tree in structured JSON form, depth first.
    Show {
        /// Session id.
        session: String,
    },

    /// Render a tree as a Markdown article.
    Render {
        /// Session id.
        session: String,
    },

    /// Apply a JSON outline: its sections are appended under the root.
    Outline {
        /// Session id.
        session: String,
        /// Path to the outline JSON file.
        file: PathBuf,
    },

    /// Register questions.
    ///
    /// Without `--node`, questions are root sub-questions and are routed to
    /// the top-level section whose title is most similar.
    Ask {
        /// Session id.
        session: String,

        /// Attach to this node instead of routing.
        #[arg(long)]
        node: Option<String>,

        /// Question source: `root_subq`, `outline`, or `expansion`.
        #[arg(long)]
        source: Option<String>,

        /// Question texts.
        #[arg(required = true)]
        questions: Vec<String>,
    },

    /// Retrieve new evidence for a node and generate expansion questions.
    Expand {
        /// Session id.
        session: String,
        /// Node selector.
        node: String,

        /// Number of chunks to request (defaults to `[tree].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Turn clusters of novel expansion questions into sub-sections.
    Deepen {
        /// Session id.
        session: String,
        /// Node selector.
        node: String,

        /// Only report whether the node is ready to deepen.
        #[arg(long)]
        check: bool,
    },

    /// Write a section's content from its questions and evidence.
    Write {
        /// Session id.
        session: String,
        /// Node selector.
        node: String,
    },

    /// Write a section's summary and conclusion.
    Complete {
        /// Session id.
        session: String,
        /// Node selector.
        node: String,
    },

    /// Recompute rank and level for every node and print the outline.
    Rank {
        /// Session id.
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Create { query } => {
            session_cmd::run_create(&cfg, &query).await?;
        }
        Commands::Sessions => {
            session_cmd::run_sessions(&cfg).await?;
        }
        Commands::Show { session } => {
            session_cmd::run_show(&cfg, &session).await?;
        }
        Commands::Render { session } => {
            session_cmd::run_render(&cfg, &session).await?;
        }
        Commands::Outline { session, file } => {
            session_cmd::run_outline(&cfg, &session, &file).await?;
        }
        Commands::Ask {
            session,
            node,
            source,
            questions,
        } => {
            session_cmd::run_ask(&cfg, &session, node.as_deref(), source.as_deref(), &questions)
                .await?;
        }
        Commands::Expand {
            session,
            node,
            top_k,
        } => {
            grow_cmd::run_expand(&cfg, &session, &node, top_k).await?;
        }
        Commands::Deepen {
            session,
            node,
            check,
        } => {
            grow_cmd::run_deepen(&cfg, &session, &node, check).await?;
        }
        Commands::Write { session, node } => {
            grow_cmd::run_write(&cfg, &session, &node).await?;
        }
        Commands::Complete { session, node } => {
            grow_cmd::run_complete(&cfg, &session, &node).await?;
        }
        Commands::Rank { session } => {
            session_cmd::run_rank(&cfg, &session).await?;
        }
    }

    Ok(())
}
