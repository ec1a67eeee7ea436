//! Inventory service: confirms received orders.

use std::process::ExitCode;

use api::config::Service;
use saga::InventoryStage;

#[tokio::main]
async fn main() -> ExitCode {
    api::service::consumer_main(Service::Inventory, |_| InventoryStage).await
}
