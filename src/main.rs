use clap::Parser;
use lan_drop::cli::{Cli, run_share};
use lan_drop::cli::ui::display_error;
use lan_drop::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format)?;

    if let Err(e) = run_share(cli.share).await {
        display_error(&format!("{:#}", e));
        eprintln!("\nRun with -h or --help for usage information.");
        std::process::exit(1);
    }

    Ok(())
}
