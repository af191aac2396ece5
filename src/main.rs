use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use kaiwa::commands::ask::{self, AskArgs};
use kaiwa::commands::chat::{self, ChatArgs};
use kaiwa::commands::config::{self, ConfigArgs};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("KAIWA_GIT_SHA"),
    " ",
    env!("KAIWA_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  kaiwa chat --model gpt-4o-mini\n  echo \"2+2?\" | kaiwa ask --model gpt-4o-mini\n  kaiwa ask --model gpt-4o-mini --image photo.png \"What is in this picture?\"\n  kaiwa config check";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  kaiwa ask --model gpt-4o-mini \"2+2?\"\n  echo \"2+2?\" | kaiwa ask --model gpt-4o-mini --stream\n  kaiwa ask --model gpt-4o-mini --dry-run --json \"Explain transcripts\"";

#[derive(Debug, Parser)]
#[command(
    name = "kaiwa",
    about = "Chat-completion client for hosted models",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start an interactive conversation")]
    Chat(ChatArgs),
    #[command(about = "Ask a one-shot question", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "kaiwa", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "kaiwa", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "kaiwa", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat::run(args).await,
        Commands::Ask(args) => ask::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
