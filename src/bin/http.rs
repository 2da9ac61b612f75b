#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::time::Duration;

    use garbage_collection::{GarbageCollectionConfig, http_api, load_config_from_json};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("garbage_collection=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("GARBAGE_COLLECTION_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let config = match std::env::var("GARBAGE_COLLECTION_CONFIG") {
        Ok(path) => load_config_from_json(path)?,
        Err(_) => GarbageCollectionConfig::default(),
    };
    let refresh_every = Duration::from_secs(config.throttle_seconds.max(1).unsigned_abs());
    let aggregator = config.build_aggregator()?;

    println!("garbage-collection HTTP API listening on http://{addr}");
    http_api::serve(addr, aggregator, refresh_every).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
