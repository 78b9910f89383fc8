//! Product service process.

use std::process::ExitCode;

use bootwire_server::{bootstrap, config::ServiceProfile};

#[tokio::main]
async fn main() -> ExitCode {
    bootstrap::main_for(ServiceProfile::ProductService).await
}
