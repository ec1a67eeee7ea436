//! Shipper service: ships packed orders and tells the customer.

use std::process::ExitCode;

use api::config::Service;
use saga::ShipperStage;

#[tokio::main]
async fn main() -> ExitCode {
    api::service::consumer_main(Service::Shipper, |config| {
        ShipperStage::new(config.notification_from.clone())
    })
    .await
}
