//! # Blogforge CLI (`blogforge`)
//!
//! ## Usage
//!
//! ```bash
//! blogforge --config ./config/blogforge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blogforge init` | Create the SQLite database and run schema migrations |
//! | `blogforge serve` | Start the HTTP API |
//! | `blogforge knowledge upload` | Chunk, embed and store a document |
//! | `blogforge knowledge search "<query>"` | Semantic search over a collection |
//! | `blogforge knowledge list` | List an owner's documents |
//! | `blogforge knowledge delete <id>` | Delete a document and its vectors |
//! | `blogforge research "<topic>"` | Research a topic |
//! | `blogforge outline "<topic>"` | Generate an outline |
//! | `blogforge explain "<concept>"` | Explain a concept |
//! | `blogforge seo <file>` | SEO report for a markdown file |
//! | `blogforge workflow "<topic>"` | Run the full blog workflow |
//!
//! Every command prints JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use blogforge::config;
use blogforge::content::{ExplainParams, OutlineParams, ResearchParams, SeoParams};
use blogforge::context::AppContext;
use blogforge::knowledge::{SearchRequest, UploadRequest, DEFAULT_OWNER};
use blogforge::workflow::{as_failure, BlogParams};
use blogforge::{db, migrate, server};
use blogforge_core::content::{ExplainRequest, OutlineRequest, SeoRequest};
use blogforge_core::models::{Depth, ExplainMode, Tone};
use blogforge_core::workflow::WorkflowRequest;

/// Blogforge: research, outline, draft, review and SEO-optimize blog posts
/// with a retrieval-augmented LLM pipeline.
#[derive(Parser)]
#[command(name = "blogforge", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/blogforge.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Manage the knowledge base.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Research a topic across the knowledge base (and the web, if enabled).
    Research {
        topic: String,
        #[arg(long)]
        niche: Option<String>,
        /// shallow, medium or deep.
        #[arg(long, default_value = "medium")]
        depth: Depth,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Generate a blog outline.
    Outline {
        topic: String,
        #[arg(long)]
        niche: Option<String>,
        #[arg(long, default_value = "intermediate")]
        audience: String,
        #[arg(long, default_value_t = 2000)]
        word_count: u32,
        /// Leave code examples out of the plan.
        #[arg(long)]
        no_code: bool,
        /// Skip research context.
        #[arg(long)]
        no_research: bool,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Explain a technical concept.
    Explain {
        concept: String,
        /// eli5, technical or deep-dive.
        #[arg(long, default_value = "technical")]
        mode: ExplainMode,
        #[arg(long)]
        no_examples: bool,
        #[arg(long)]
        no_analogies: bool,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Produce an SEO report for a content file.
    Seo {
        file: PathBuf,
        /// Target keyword; repeat for several. Auto-detected when omitted.
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Run research → outline → draft → review → SEO for a topic.
    Workflow {
        topic: String,
        #[arg(long)]
        niche: Option<String>,
        #[arg(long, default_value = "intermediate")]
        audience: String,
        #[arg(long, default_value_t = 2000)]
        word_count: u32,
        /// conversational, formal or tutorial.
        #[arg(long, default_value = "conversational")]
        tone: Tone,
        #[arg(long, default_value = "medium")]
        depth: Depth,
        #[arg(long)]
        no_code: bool,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Upload a text or markdown file.
    Upload {
        file: PathBuf,
        /// Defaults to the file name.
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "general")]
        document_type: String,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        source_url: Option<String>,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Semantic search.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[arg(long)]
        document_type: Option<String>,
        #[arg(long)]
        collection: Option<String>,
    },

    /// List documents owned by `--owner`.
    List {
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Delete a document and its vectors.
    Delete { id: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,blogforge=debug,blogforge_core=debug"
    } else {
        "info,blogforge=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            print_json(&serde_json::json!({
                "status": "initialized",
                "db": cfg.db.path,
            }))?;
        }
        Commands::Serve => {
            let ctx = Arc::new(AppContext::from_config(cfg).await?);
            server::run_server(ctx).await?;
        }
        command => {
            let ctx = AppContext::from_config(cfg).await?;
            let result = run_command(&ctx, command).await;
            ctx.close().await;
            result?;
        }
    }

    Ok(())
}

async fn run_command(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Knowledge { action } => run_knowledge(ctx, action).await?,
        Commands::Research {
            topic,
            niche,
            depth,
            owner,
        } => {
            let result = ctx
                .content
                .research(ResearchParams {
                    topic,
                    niche,
                    depth,
                    owner,
                })
                .await?;
            print_json(&result)?;
        }
        Commands::Outline {
            topic,
            niche,
            audience,
            word_count,
            no_code,
            no_research,
            owner,
        } => {
            let outline = ctx
                .content
                .outline(OutlineParams {
                    request: OutlineRequest {
                        topic,
                        niche,
                        target_audience: audience,
                        word_count,
                        include_code_examples: !no_code,
                    },
                    use_research: !no_research,
                    owner,
                })
                .await?;
            print_json(&outline)?;
        }
        Commands::Explain {
            concept,
            mode,
            no_examples,
            no_analogies,
            owner,
        } => {
            let explanation = ctx
                .content
                .explain(ExplainParams {
                    request: ExplainRequest {
                        concept,
                        mode,
                        include_examples: !no_examples,
                        include_analogies: !no_analogies,
                    },
                    owner,
                })
                .await?;
            print_json(&explanation)?;
        }
        Commands::Seo {
            file,
            keywords,
            audience,
            owner,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = ctx
                .content
                .optimize_seo(SeoParams {
                    request: SeoRequest {
                        content,
                        keywords,
                        target_audience: audience,
                    },
                    owner,
                })
                .await?;
            print_json(&report)?;
        }
        Commands::Workflow {
            topic,
            niche,
            audience,
            word_count,
            tone,
            depth,
            no_code,
            owner,
        } => {
            let request = WorkflowRequest {
                niche,
                target_audience: audience,
                word_count,
                tone,
                depth,
                include_code_examples: !no_code,
                ..WorkflowRequest::new(topic)
            };
            match ctx.workflow.run(BlogParams { request, owner }).await {
                Ok(state) => print_json(&state)?,
                Err(err) => {
                    if let Some(failure) = as_failure(&err) {
                        print_json(&failure.state)?;
                    }
                    return Err(err);
                }
            }
        }
        Commands::Init | Commands::Serve => {}
    }
    Ok(())
}

async fn run_knowledge(ctx: &AppContext, action: KnowledgeAction) -> Result<()> {
    match action {
        KnowledgeAction::Upload {
            file,
            title,
            document_type,
            collection,
            source_url,
            owner,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.display().to_string())
            });
            let request = UploadRequest {
                document_type,
                collection,
                source_url,
                owner,
                ..UploadRequest::new(title, content)
            };
            print_json(&ctx.knowledge.upload(request).await?)?;
        }
        KnowledgeAction::Search {
            query,
            top_k,
            document_type,
            collection,
        } => {
            let request = SearchRequest {
                top_k,
                document_type,
                collection,
                ..SearchRequest::new(query)
            };
            print_json(&ctx.knowledge.search(&request).await?)?;
        }
        KnowledgeAction::List { owner } => {
            print_json(&ctx.knowledge.list(&owner).await?)?;
        }
        KnowledgeAction::Delete { id } => {
            print_json(&ctx.knowledge.delete(&id).await?)?;
        }
    }
    Ok(())
}
