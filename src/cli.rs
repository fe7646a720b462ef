use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "randtalk")]
#[command(author, version, about = "Anonymous partner-matching Telegram bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot and the web API
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Apply pending database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["randtalk", "run", "--webhook"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run { webhook: true })));

        let cli = Cli::try_parse_from(["randtalk", "migrate"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Migrate)));

        let cli = Cli::try_parse_from(["randtalk"]).unwrap();
        assert!(cli.command.is_none());
    }
}
