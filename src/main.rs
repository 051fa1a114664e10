// src/main.rs

use incbuild::errors::BuildError;
use incbuild::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("incbuild error: {err:?}");
        let code = match err.downcast_ref::<BuildError>() {
            Some(BuildError::Cancelled) => 130,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
