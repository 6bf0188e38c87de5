//! Notifications Worker Service - Entry Point
//!
//! Background worker that delivers scheduled and reminder notifications from
//! the Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    notifications_worker::run().await
}
