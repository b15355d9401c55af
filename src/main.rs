use clap::Parser;
use site_mirror::{CancellationToken, Mirror, MirrorConfig, MirrorError};

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    ::log::info!("Starting mirror of {}", config.seed_url);

    // Ctrl-C or SIGTERM stops new work; in-flight tasks finish
    let cancel = CancellationToken::new();
    if let Err(e) = spawn_shutdown_listener(cancel.clone()) {
        ::log::warn!("Cannot listen for shutdown signals: {}", e);
    }

    let start_time = std::time::Instant::now();
    let outcome = match Mirror::from_config(config).run(cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ::log::error!("Failed to start mirror: {}", e);
            std::process::exit(1);
        }
    };

    let stats = outcome.stats();
    let state = if outcome.is_cancelled() {
        "cancelled"
    } else {
        "complete"
    };
    ::log::info!(
        "Mirror {} - {} pages, {} assets, {} failed, {} robots-blocked, {} off-host in {:.2}s",
        state,
        stats.pages_saved,
        stats.assets_saved,
        stats.failed,
        stats.robots_skipped,
        stats.out_of_scope,
        start_time.elapsed().as_secs_f64()
    );
}

/// Builds the run configuration from the optional config file and the flags
fn load_config(args: Args) -> Result<MirrorConfig, MirrorError> {
    let base = match &args.config {
        Some(path) => MirrorConfig::from_file(path)?,
        None => MirrorConfig::new("", "mirror_output"),
    };
    let config = args.apply(base);
    config.validate()?;
    Ok(config)
}

/// Cancels `cancel` on Ctrl-C or, on Unix, SIGTERM
///
/// The SIGTERM handler is installed before this returns, so a signal sent
/// right afterwards is not lost.
fn spawn_shutdown_listener(cancel: CancellationToken) -> std::io::Result<()> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = terminate.recv();
        #[cfg(not(unix))]
        let terminated = std::future::pending::<Option<()>>();

        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => match interrupted {
                Ok(()) => ::log::info!("Interrupted, finishing in-flight work"),
                Err(e) => {
                    ::log::warn!("Cannot listen for Ctrl-C: {}", e);
                    return;
                }
            },
            _ = terminated => ::log::info!("Terminated, finishing in-flight work"),
        }
        cancel.cancel();
    });
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_cancels_the_run() {
        let cancel = CancellationToken::new();
        spawn_shutdown_listener(cancel.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .expect("SIGTERM should cancel the token");
    }
}
