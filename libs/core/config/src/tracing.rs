use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, prelude::*};

/// Install color-eyre so startup failures print readable reports.
///
/// Call first in `main()`, before anything fallible. Safe to call more
/// than once.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// `RUST_LOG` when set; otherwise `error` in production, `trace` elsewhere.
fn env_filter(environment: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if environment.is_production() {
            "error"
        } else {
            "trace"
        })
    })
}

/// Initialize the tracing subscriber for the given environment.
///
/// Production gets JSON with flattened event fields for the log
/// aggregator; development gets pretty human-readable output. Both stacks
/// include `tracing_error::ErrorLayer` so span traces land in eyre
/// reports.
///
/// Repeat calls are ignored, which keeps tests that each initialize
/// tracing from panicking.
pub fn init_tracing(environment: &Environment) {
    let filter = env_filter(environment);

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    if result.is_ok() {
        info!(
            "Tracing initialized with ErrorLayer. Environment: {:?}",
            environment
        );
    } else {
        debug!("Tracing already initialized, skipping re-initialization");
    }
}
