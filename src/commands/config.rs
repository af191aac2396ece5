use clap::{Args, Subcommand};

use crate::chat::api::ApiTarget;
use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let target = ApiTarget::from_env().map_err(|err| err.to_string())?;
            if let Some(name) = profile.as_deref() {
                config::load_profile(name)?;
            }
            println!("config OK: endpoint {}", target.endpoint);
            Ok(())
        }
    }
}
