use clap::Parser;

use regen_derivatives::cli::{run, Cli};
use regen_derivatives::run::RunOutcome;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(RunOutcome::Completed(_)) => std::process::exit(0),
        Ok(RunOutcome::Declined) => std::process::exit(1),
        Err(e) => {
            eprintln!("[ERROR] {e}");
            std::process::exit(1);
        }
    }
}
