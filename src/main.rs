use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oauth_ssh_lib::commands::{self, AppContext};
use oauth_ssh_lib::config::ClientConfig;

#[derive(Parser)]
#[command(name = "oauth-ssh", version, about = "SSH with OAuth bearer tokens")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Token store file (default: ~/.oauth-ssh.json).
    #[arg(long, global = true, env = "OAUTH_SSH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cached tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Log in and open a shell or run a command.
    Connect {
        /// User to log in as on the remote machine.
        #[arg(short = 'l')]
        login: Option<String>,
        /// Port the SSH service runs on.
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        /// [user@]fqdn
        destination: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run the system ssh, answering its token prompt.
    #[cfg(feature = "legacy-wrapper")]
    #[command(disable_help_flag = true)]
    Ssh {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the system scp, answering its token prompt.
    #[cfg(feature = "legacy-wrapper")]
    #[command(disable_help_flag = true)]
    Scp {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Perform an interactive consent flow to get a token.
    Authorize {
        fqdn: String,
        /// Port the SSH service runs on.
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        /// Identity to use during consent, e.g. alice@example.org.
        #[arg(long)]
        identity: Option<String>,
    },
    /// Revoke the access and refresh tokens.
    Revoke { fqdn: String },
    /// Display stored details about a host.
    Show {
        #[command(subcommand)]
        what: ShowAction,
    },
}

#[derive(Subcommand)]
enum ShowAction {
    /// Display a valid access token.
    Token { fqdn: String },
    /// Display the accounts available on the host.
    Accounts {
        fqdn: String,
        #[arg(short, long, default_value_t = 22)]
        port: u16,
    },
    /// Display cached token, policy and account state.
    Status { fqdn: String },
}

/// Exit code of the command
async fn run(cli: Cli) -> oauth_ssh_lib::Result<u32> {
    let config = ClientConfig::from_env(cli.config)?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Token { action } => {
            match action {
                TokenAction::Authorize { fqdn, port, identity } => {
                    commands::token::authorize(&ctx, &fqdn, port, identity.as_deref()).await?
                }
                TokenAction::Revoke { fqdn } => commands::token::revoke(&ctx, &fqdn).await?,
                TokenAction::Show { what } => match what {
                    ShowAction::Token { fqdn } => commands::token::show_token(&ctx, &fqdn).await?,
                    ShowAction::Accounts { fqdn, port } => {
                        commands::token::show_accounts(&ctx, &fqdn, port).await?
                    }
                    ShowAction::Status { fqdn } => commands::token::show_status(&ctx, &fqdn).await?,
                },
            }
            Ok(0)
        }
        Commands::Connect {
            login,
            port,
            destination,
            command,
        } => commands::connect::connect(&ctx, login.as_deref(), port, &destination, &command).await,
        #[cfg(feature = "legacy-wrapper")]
        Commands::Ssh { args } => commands::legacy::ssh(&ctx, args).await,
        #[cfg(feature = "legacy-wrapper")]
        Commands::Scp { args } => commands::legacy::scp(&ctx, args).await,
    }
}

fn main() {
    let cli = Cli::parse();
    oauth_ssh_lib::init_logging(&cli.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => i32::try_from(code).unwrap_or(255),
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{}", e);
            1
        }
    };

    // A pending blocking stdin read must not hold up exit
    runtime.shutdown_background();
    std::process::exit(code);
}
