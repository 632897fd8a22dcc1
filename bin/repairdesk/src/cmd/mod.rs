//! Built-in `repairdesk` commands.
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;

pub mod access;
pub mod session;

/// RepairDesk access core: sessions, second factors and role based access decisions.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the RepairDesk configuration to use.
    #[arg(short = 'c', long = "config", default_value_t = String::from("repairdesk.yaml"))]
    pub config: String,

    /// Select the repairdesk command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Select the repairdesk command to run.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Decide if a role can perform an action on a resource.
    Can(CanArgs),

    /// Check the current session and resolve the principal access state.
    #[command(alias = "whoami")]
    Check,

    /// Sign in with email and password.
    Login(LoginArgs),

    /// Terminate the current session.
    Logout,

    /// Manage second factors of the signed in principal.
    #[command(subcommand)]
    Mfa(MfaCommand),

    /// Change the password of the signed in principal.
    Password(PasswordArgs),

    /// Print the effective access rule table.
    Rules,
}

/// Arguments of the `can` command.
#[derive(Clone, Debug, Args)]
pub struct CanArgs {
    /// Role of the principal (omit to check access for principals without a role).
    #[arg(long)]
    pub role: Option<String>,

    /// Resource the action is performed on.
    pub resource: String,

    /// Action to perform (list, show, create, edit, delete, clone).
    pub action: repairdesk_auth::ActionKind,
}

/// Arguments of the `login` command.
#[derive(Clone, Debug, Args)]
pub struct LoginArgs {
    /// Email of the principal to sign in as.
    pub email: String,

    /// Password of the principal (read from standard input when omitted).
    #[arg(long)]
    pub password: Option<String>,
}

/// Manage second factors of the signed in principal.
#[derive(Clone, Debug, Subcommand)]
pub enum MfaCommand {
    /// Remove a second factor.
    Disable {
        /// ID of the factor to remove.
        factor_id: String,
    },

    /// Start enrolling a new time-based one-time code factor.
    Enroll,

    /// Answer a fresh challenge for a second factor with a one-time code.
    Verify {
        /// ID of the factor to verify.
        factor_id: String,

        /// One-time code generated by the authenticator app.
        code: String,
    },
}

/// Arguments of the `password` command.
#[derive(Clone, Debug, Args)]
pub struct PasswordArgs {
    /// New password (read from standard input when omitted).
    #[arg(long)]
    pub password: Option<String>,
}

/// The command completed but the operation it performed was not successful.
#[derive(Debug, thiserror::Error)]
#[error("the {command} operation was not successful")]
pub struct OperationFailed {
    pub command: &'static str,
}

/// Print a command result as JSON to standard output.
pub fn print<T: Serialize>(result: &T) -> Result<()> {
    let result = serde_json::to_string_pretty(result)?;
    println!("{}", result);
    Ok(())
}

/// Read a secret value from standard input when not provided on the command line.
pub fn secret(value: Option<String>) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;
    use super::Command;
    use super::MfaCommand;
    use repairdesk_auth::ActionKind;

    #[test]
    fn parse_can() {
        let cli = Cli::parse_from(["repairdesk", "can", "--role", "front_desk", "customers", "edit"]);
        assert_eq!(cli.config, "repairdesk.yaml");
        match cli.command {
            Command::Can(args) => {
                assert_eq!(args.role.as_deref(), Some("front_desk"));
                assert_eq!(args.resource, "customers");
                assert_eq!(args.action, ActionKind::Edit);
            }
            command => panic!("unexpected command {:?}", command),
        }
    }

    #[test]
    fn parse_mfa_verify() {
        let cli = Cli::parse_from(["repairdesk", "-c", "conf.yaml", "mfa", "verify", "f1", "123456"]);
        assert_eq!(cli.config, "conf.yaml");
        match cli.command {
            Command::Mfa(MfaCommand::Verify { factor_id, code }) => {
                assert_eq!(factor_id, "f1");
                assert_eq!(code, "123456");
            }
            command => panic!("unexpected command {:?}", command),
        }
    }

    #[test]
    fn parse_rejects_unknown_action() {
        let result = Cli::try_parse_from(["repairdesk", "can", "customers", "archive"]);
        assert!(result.is_err());
    }
}
