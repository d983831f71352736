//! Serves the Eddystone-URL configuration GATT service on the default adapter.

use clap::Parser;
use eddystone_config::{run, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eddystone_config::Result<()> {
    run(Config::parse()).await
}
