//! bookforge CLI entry point

use bookforge::{
    commands::{
        cmd_crawl, cmd_generate, cmd_init, cmd_list_sites, cmd_pipeline, cmd_register, cmd_status,
        print_batch_summary, print_generation_report, print_pipeline_report, print_site,
        print_sites, print_status, CrawlOptions, GenerateOptions,
    },
    config::Config,
    error::Result,
    pipeline::{PipelineOptions, Stage},
    progress::LogWriterFactory,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bookforge")]
#[command(version, about = "Multi-site novel crawler and training-corpus generator", long_about = None)]
struct Cli {
    /// Base data directory (defaults to ~/.bookforge)
    #[arg(short, long, global = true, env = "BOOKFORGE_DIR")]
    dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directories
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Register a site for crawling
    Register {
        /// Site URL (e.g. https://m.shuhaige.net)
        url: String,
    },

    /// List registered sites
    Sites,

    /// Crawl novels from a registered site
    Crawl {
        /// Site id (use 'bookforge sites' to list)
        site: String,

        /// Novel category (e.g. 都市, 玄幻)
        #[arg(short, long)]
        category: String,

        /// Number of novels to crawl
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Include ongoing novels, not only completed ones
        #[arg(long)]
        all: bool,
    },

    /// Generate the training sample file from crawled novels
    Generate {
        /// Source tree (defaults to the organized tree)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Fallback tree (defaults to the crawl tree)
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Emit identity rows instead of rewritten ones
        #[arg(long)]
        no_rewrite: bool,
    },

    /// Run the full pipeline: scrape, organize, generate, train
    Pipeline {
        /// Site id (omit to run over existing data)
        #[arg(long)]
        site: Option<String>,

        /// Novel category
        #[arg(long)]
        category: Option<String>,

        /// Number of novels to crawl
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Stages to skip (comma-separated: scrape,organize,generate,train)
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
    },

    /// Show corpus status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Init and completions work without an existing config
    if let Commands::Init { force } = cli.command {
        let config = cmd_init(cli.dir, force).await?;
        println!("✓ bookforge initialized");
        println!("  Config: {}", config.paths.config_file.display());
        println!("\nNext steps:");
        println!("  1. Register a site: bookforge register https://m.shuhaige.net");
        println!("  2. Crawl novels: bookforge crawl m.shuhaige.net --category 都市");
        println!("  3. Generate samples: bookforge generate");
        return Ok(());
    }
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "bookforge", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load_from(cli.dir)?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Register { url } => {
            let site = cmd_register(&config, &url).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&site)?);
            } else {
                print_site(&site);
            }
        }

        Commands::Sites => {
            let sites = cmd_list_sites(&config)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else {
                print_sites(&sites);
            }
        }

        Commands::Crawl {
            site,
            category,
            count,
            all,
        } => {
            let options = CrawlOptions {
                site_id: site,
                category,
                count,
                include_ongoing: all,
            };
            let summary = cmd_crawl(&config, &options).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_batch_summary(&summary);
            }
        }

        Commands::Generate {
            source,
            fallback,
            no_rewrite,
        } => {
            let options = GenerateOptions {
                source,
                fallback,
                no_rewrite,
            };
            let report = cmd_generate(&config, &options)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_generation_report(&report);
            }
        }

        Commands::Pipeline {
            site,
            category,
            count,
            skip,
        } => {
            let mut stages = std::collections::BTreeSet::new();
            for name in &skip {
                stages.insert(name.parse::<Stage>()?);
            }
            let options = PipelineOptions {
                site,
                category,
                count,
                skip: stages,
            };
            let report = cmd_pipeline(&config, &options).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_pipeline_report(&report);
            }
            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}
