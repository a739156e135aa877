use clap::Parser;
use fotree_cli::args::{Cli, Commands};
use fotree_tracing::TracingBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let tracing_handle = TracingBuilder::default()
        .level(cli.log_level)
        .enable_progressbar()
        .build()?;

    match cli.command {
        Commands::Characterize {
            names,
            persister,
            expand_archives,
            invocation,
        } => {
            let config = invocation.to_config()?;
            let mut stdout = tracing_handle.get_stdout_writer();

            fotree_cli::characterize(&names, &persister, expand_archives, &config, &mut stdout)
                .await?;
        }
    }

    Ok(())
}
