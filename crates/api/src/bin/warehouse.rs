//! Warehouse service: picks and packs confirmed orders.

use std::process::ExitCode;

use api::config::Service;
use saga::WarehouseStage;

#[tokio::main]
async fn main() -> ExitCode {
    api::service::consumer_main(Service::Warehouse, |config| {
        WarehouseStage::new(config.notification_from.clone())
    })
    .await
}
