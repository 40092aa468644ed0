//! Tracing setup for binaries and examples embedding the session.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "idlemmo_player=info";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `idlemmo_player=info`. Calling this
/// twice is harmless: the second install fails and is ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
