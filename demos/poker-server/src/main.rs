//! Runnable planning-poker server.
//!
//! Binds the WebSocket gateway with default grace periods. The bind
//! address comes from `POINTFORGE_ADDR` (default `0.0.0.0:8080`); log
//! verbosity from `RUST_LOG` (e.g. `RUST_LOG=pointforge=debug`).

use pointforge::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::var("POINTFORGE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let server = PointforgeServerBuilder::new()
        .bind(&addr)
        .build()
        .await?;

    tracing::info!(%addr, "planning poker server listening");
    server.run().await?;
    Ok(())
}
