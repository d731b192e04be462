use clap::Parser;

use paperdex::error::IndexError;
use paperdex::logging;

mod commands;

use commands::build::{run_build, BuildOverrides};
use commands::inspect;
use commands::validate::run_validate;
use commands::{Cli, Commands, InspectCommands};

fn main() {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            config,
            num_barrels,
            freq_threshold,
            barrel_exponent,
            spill_threshold,
            min_token_len,
            stopwords,
            limit,
            log_every,
        } => run_build(
            &input,
            &output,
            config.as_deref(),
            BuildOverrides {
                num_barrels,
                freq_threshold,
                barrel_exponent,
                spill_threshold,
                min_token_len,
                stopwords,
                limit,
                log_every,
            },
        ),

        Commands::Inspect(inspect_command) => match inspect_command {
            InspectCommands::Lexicon { storage, top } => inspect::inspect_lexicon(&storage, top),
            InspectCommands::Mapping { storage } => inspect::inspect_mapping(&storage),
            InspectCommands::Offsets { storage, top } => inspect::inspect_offsets(&storage, top),
            InspectCommands::Barrels { storage } => inspect::inspect_barrels(&storage),
        },

        Commands::Validate { storage } => run_validate(&storage),
    };

    if let Err(err) = result {
        log::error!("{:#}", err);
        let code = err
            .downcast_ref::<IndexError>()
            .map(IndexError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
