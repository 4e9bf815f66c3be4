use clap::{Parser, Subcommand};
use daily_bread_api::{ApiConfig, BibleApiClient};
use daily_bread_feed::feed::{FeedEngine, FeedEngineConfig, FeedEntry};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// A CLI for the Daily Bread verse feed.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory containing the .daily-bread.db database file
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the feed database
    Init,
    /// Generate and print a new batch of feed items
    Feed {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the visible feed in display order
    Show {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Toggle like on a feed item
    Like {
        /// Feed item ID
        id: String,
    },
    /// Hide a feed item from the feed
    Hide {
        /// Feed item ID
        id: String,
    },
    /// Comment on a feed item
    Comment {
        /// Feed item ID
        feed_item_id: String,
        /// Comment text
        text: String,
        /// Reply to an existing comment
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a comment and all of its replies
    DeleteComment {
        /// Comment ID
        id: String,
    },
    /// Show cache coverage statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let fetcher = Arc::new(BibleApiClient::new(ApiConfig::default())?);
    let mut engine =
        FeedEngine::new(&args.base_dir, fetcher, FeedEngineConfig::default()).await?;

    match args.command {
        Commands::Init => {
            println!("Initialized feed database at {}", args.base_dir.display());
            println!(
                "Database location: {}/.daily-bread.db",
                args.base_dir.display()
            );
            Ok(())
        }
        Commands::Feed { format } => {
            let batch = engine.generate_feed_batch().await?;
            print_entries(&batch, &format)?;
            Ok(())
        }
        Commands::Show { format } => {
            let entries = engine.visible_feed().await?;
            print_entries(&entries, &format)?;
            Ok(())
        }
        Commands::Like { id } => {
            engine.toggle_like(&id).await?;
            match engine.index().get_feed_item(&id).await? {
                Some(item) if item.liked => println!("Liked {id}"),
                Some(_) => println!("Unliked {id}"),
                None => println!("Feed item {id} not found"),
            }
            Ok(())
        }
        Commands::Hide { id } => {
            engine.hide_feed_item(&id).await?;
            println!("Hidden {id}");
            Ok(())
        }
        Commands::Comment {
            feed_item_id,
            text,
            parent,
        } => {
            let comment = engine.add_comment(&feed_item_id, &text, parent).await?;
            println!("Added comment {}", comment.id);
            Ok(())
        }
        Commands::DeleteComment { id } => {
            let removed = engine.delete_comment(&id).await?;
            println!("Removed {removed} comment(s)");
            Ok(())
        }
        Commands::Stats { format } => {
            let stats = engine.cache_stats().await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary => {
                    println!("Cache statistics:");
                    println!(
                        "  Cached chapters: {} / {}",
                        stats.cached_chapters, stats.total_chapters
                    );
                    println!("  Cached verses: {}", stats.cached_verses);
                }
            }
            Ok(())
        }
    }
}

fn print_entries(entries: &[FeedEntry], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Summary => {
            println!("{} feed item(s):", entries.len());
            for entry in entries {
                let marks = format!(
                    "{}{}",
                    if entry.item.liked { "♥" } else { " " },
                    if entry.item.hidden { "✕" } else { " " }
                );
                println!(
                    "  {} |{}| {} — {}",
                    entry.item.id, marks, entry.verse.reference, entry.verse.text
                );
            }
        }
    }
    Ok(())
}
