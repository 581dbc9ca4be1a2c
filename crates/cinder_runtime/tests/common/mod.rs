//! Shared helpers for the runtime integration tests.

#![allow(dead_code)]

use cinder_runtime::{Executor, Request, Response};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn request(source: &str) -> Request {
    Request::new(cinder_syntax::parse_executable(source).expect("query parses"))
}

pub async fn run(executor: &Executor, source: &str) -> Response {
    init_tracing();
    executor
        .execute(request(source))
        .await
        .expect("operation is selectable")
}

pub fn data(response: &Response) -> serde_json::Value {
    response
        .data
        .clone()
        .map_or(serde_json::Value::Null, serde_json::Value::from)
}
