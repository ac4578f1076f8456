//! Serves flight fares over HTTP from an in-memory backend.
//!
//! ```sh
//! RECORDS_BIND_ADDR=127.0.0.1:3000 RECORDS_LOG_LEVEL=debug cargo run --bin fare-server
//! ```

use std::sync::Arc;

use versioned_records::{
    http, FlightFare, InMemoryAuditLog, InMemoryBackend, ServerConfig, VersionedRecordStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, defaulted) = ServerConfig::load()?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();
    config.log_defaults(&defaulted);

    let audit = InMemoryAuditLog::new();
    let store = VersionedRecordStore::<_, FlightFare>::new(InMemoryBackend::new())
        .with_audit(Arc::new(audit));

    http::serve(Arc::new(store), &config.bind_addr).await?;
    Ok(())
}
