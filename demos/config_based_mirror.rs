use clap::Parser;
use site_mirror::{CancellationToken, Mirror};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to mirror configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Override max depth
    #[arg(short, long)]
    depth: Option<usize>,

    /// Override concurrency
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Stop after this many seconds
    #[arg(short, long)]
    limit: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    // Load configuration from file
    let mut mirror = Mirror::from_config_file(&args.config)?;

    let config = mirror.config();
    println!("Mirror configuration:");
    println!("  Seed URL: {}", config.seed_url);
    println!("  Output directory: {}", config.output_dir.display());
    println!("  Max depth: {}", config.max_depth);
    println!("  Concurrency: {}", config.concurrency);
    println!("  Respect robots.txt: {}", config.respect_robots);
    println!("  Same host only: {}", config.same_host_only);
    println!(
        "  Include/exclude patterns: {}/{}",
        config.include_patterns.len(),
        config.exclude_patterns.len()
    );

    // Apply overrides if specified
    if let Some(depth) = args.depth {
        println!("Overriding max depth: {}", depth);
        mirror = mirror.with_max_depth(depth);
    }

    if let Some(concurrency) = args.concurrency {
        println!("Overriding concurrency: {}", concurrency);
        mirror = mirror.with_concurrency(concurrency);
    }

    let cancel = CancellationToken::new();
    if let Some(limit) = args.limit {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(limit)).await;
            println!("Time limit of {}s reached, stopping", limit);
            token.cancel();
        });
    }

    let start_time = std::time::Instant::now();
    let outcome = mirror.run(cancel).await?;
    let stats = outcome.stats();

    println!(
        "Mirror {}. Saved {} pages and {} assets ({} failed) in {:.2} seconds.",
        if outcome.is_cancelled() { "stopped early" } else { "complete" },
        stats.pages_saved,
        stats.assets_saved,
        stats.failed,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
