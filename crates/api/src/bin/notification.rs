use std::process::ExitCode;

use api::config::Service;
use saga::NotificationStage;

#[tokio::main]
async fn main() -> ExitCode {
    api::service::consumer_main(Service::Notification, |_| NotificationStage::default()).await
}
