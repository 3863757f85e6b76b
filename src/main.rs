//! trust-harness - end-to-end checks for a trust-management client
//!
//! Drives the client through repository creation, publishing and key
//! rotation from two independent trust directories against a live server.

use clap::Parser;
use trust_harness::commands::HarnessArgs;
use trust_harness::{cli, common::logging};

#[tokio::main]
async fn main() {
    let args = HarnessArgs::parse();
    logging::init_cli(args.verbose, args.log_file.as_deref());

    if let Err(e) = cli::run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
