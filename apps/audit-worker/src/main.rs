//! Audit Worker Service - Entry Point
//!
//! Background worker that persists appointment audit events from the Redis
//! stream into the append-only audit log.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    audit_worker::run().await
}
