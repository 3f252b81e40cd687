//! CLI module graph.

pub mod command;
pub mod output;
pub mod run;
pub mod status;
pub mod stop;
pub mod submit;

use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use command::{Cli, Commands};

/// Dispatch a parsed command line.
///
/// # Errors
/// Returns the first error raised by the selected command.
pub async fn dispatch(cli: Cli) -> Result<()> {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            config.init_logging();
            run::execute(&config, &args).await
        }
        Commands::Submit(args) => submit::execute(&config, &args),
        Commands::Stop(args) => stop::execute(&config, &args),
        Commands::Status(args) => status::execute(&config, &args),
    }
}
