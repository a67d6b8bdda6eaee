mod app;
mod config;
mod db;
mod delay;
mod email;
mod error;
mod extractor;
mod generator;
mod logger;
mod models;
mod notifier;
mod publisher;
mod scheduler;
mod selector;
mod sitemap;
mod style;
mod telegram;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::app::RunOptions;

#[derive(Parser)]
#[command(name = "tweet-my-blog")]
#[command(about = "Promote blog posts from a sitemap with one AI-written tweet a day")]
struct Cli {
    /// Generate and print the tweet without posting or recording it
    #[arg(long)]
    test: bool,

    /// Run now, whatever today's scheduled slot is
    #[arg(long)]
    force: bool,

    /// Print publishing statistics and exit
    #[arg(long)]
    stats: bool,

    /// Delete records older than DAYS and exit
    #[arg(long, value_name = "DAYS")]
    cleanup: Option<u32>,

    /// Write a config template to the XDG config dir and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    app::run(RunOptions {
        test_mode: cli.test,
        force: cli.force,
        stats: cli.stats,
        cleanup_days: cli.cleanup,
        init_config: cli.init_config,
    })
    .await
}
