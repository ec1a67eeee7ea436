//! Order ingestion service: accepts orders over HTTP and starts the saga.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    api::service::order_service_main().await
}
