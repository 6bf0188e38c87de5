//! Shared web plumbing for the audit services.
//!
//! Every HTTP-facing binary in the workspace assembles its server from the
//! same parts: [`server::create_router`] wraps the app's routes with docs,
//! middleware and JSON fallbacks, [`server::health_router`] adds liveness,
//! and [`server::create_production_app`] serves with graceful shutdown and
//! a bounded cleanup phase. [`errors`] keeps every failure on one response
//! shape, whether raised by a handler or by a router fallback.
//!
//! ```ignore
//! use axum::Router;
//! use axum_helpers::server::{create_production_app, create_router, health_router};
//! use core_config::{app_info, server::ServerConfig};
//! use std::time::Duration;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(paths())]
//! struct ApiDoc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = create_router::<ApiDoc>(Router::new()).await?;
//!     let app = router.merge(health_router(app_info!()));
//!
//!     let config = ServerConfig::default();
//!     create_production_app(app, &config, Duration::from_secs(30), async {}).await?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod http;
pub mod server;

pub use server::{
    HealthCheckFuture, create_production_app, create_router, health_router, run_health_checks,
};

pub use errors::{AppError, ErrorCode, ErrorResponse};
