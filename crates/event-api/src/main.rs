//! Audit event adapter: HTTP ingestion in front of durable queues, drained by a worker pool.

use event_api::{app, config::AppConfig, logging, server, shutdown};
use event_types::EventProvider;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;
    logging::init_logging(config.log_level, config.log_format)?;
    let cancel = shutdown::shutdown_token();
    let panicked = shutdown::cancel_on_panic(cancel.clone());

    let queues = app::open_queues(&config.queue_backend, config.create_queues)?;
    let provider: Arc<dyn EventProvider> = Arc::new(app::build_service(&config, queues)?);

    let router = server::router(Arc::new(server::AppState {
        provider: Arc::clone(&provider),
    }));
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!(
        addr = %config.listen,
        workers = config.workers,
        "event adapter listening"
    );

    let serve = {
        let cancel = cancel.clone();
        async move {
            let served = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(cancel.clone().cancelled_owned())
                .await;
            // Workers stop with the server, whichever way it ended.
            cancel.cancel();
            served
        }
    };
    let (served, read) = tokio::join!(serve, provider.read(cancel.clone()));

    served?;
    read?;
    if panicked.is_set() {
        return Err("stopped after a panic".into());
    }
    tracing::info!("shutdown complete");
    Ok(())
}
