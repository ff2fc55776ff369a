// src/main.rs

use mlorch::errors::MlorchError;
use mlorch::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("mlorch error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run_main() -> Result<(), MlorchError> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
