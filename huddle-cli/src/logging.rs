use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// `RUST_LOG` wins over the command line level when set.
pub fn setup_tracing_subscriber(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).try_init()?;

    tracing::debug!("Set up tracing subscriber");
    Ok(())
}
