use cats_api_lambda::adapters::dynamo::DynamoDocumentBackend;
use cats_api_lambda::config::HandlerConfig;
use cats_api_lambda::handlers::cats::handle_cats_event;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

async fn handle_request(
    event: LambdaEvent<Value>,
    backend: &DynamoDocumentBackend,
    config: &HandlerConfig,
) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    let span = tracing::info_span!("invocation", request_id = %context.request_id);

    handle_cats_event(backend, config, payload)
        .instrument(span)
        .await
        .map_err(Error::from)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let config = HandlerConfig::from_env()?;
    let backend = DynamoDocumentBackend::from_config(&config).await;

    lambda_runtime::run(service_fn(|event| {
        handle_request(event, &backend, &config)
    }))
    .await
}
