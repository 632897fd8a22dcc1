//! Combine individual logical units to initialise and run RepairDesk commands.
use anyhow::Result;
use clap::Parser;

use repairdesk_conf::Conf;

mod cmd;
mod init;

pub use self::cmd::Cli;

/// Initialise the repairdesk process and invoke a command implementation.
pub async fn execute(cli: Cli, conf: Conf) -> Result<()> {
    match cli.command {
        cmd::Command::Can(args) => cmd::access::can(args, conf),
        cmd::Command::Rules => cmd::access::rules(conf),
        cmd::Command::Check => cmd::session::check(conf).await,
        cmd::Command::Login(args) => cmd::session::login(args, conf).await,
        cmd::Command::Logout => cmd::session::logout(conf).await,
        cmd::Command::Mfa(command) => cmd::session::mfa(command, conf).await,
        cmd::Command::Password(args) => cmd::session::password(args, conf).await,
    }
}

/// Initialise the async runtime for the process and invoke [`execute`].
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let conf = repairdesk_conf::load(&cli.config)?;
    conf.runtime
        .tokio
        .clone()
        .into_runtime()?
        .block_on(execute(cli, conf))
}
