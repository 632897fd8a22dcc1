//! Session and second factor commands driving the session gate.
use anyhow::Result;

use repairdesk_conf::Conf;
use repairdesk_session::SessionState;

use super::LoginArgs;
use super::MfaCommand;
use super::OperationFailed;
use super::PasswordArgs;
use crate::init::SessionInit;

/// Check the current session and resolve the principal access state.
///
/// When the check requires it, session leftovers are cleaned up with a logout.
pub async fn check(conf: Conf) -> Result<()> {
    let init = SessionInit::configure(conf).await?;
    let check = init.gate.check_session(&init.context).await;
    if check.force_logout {
        let cleanup = init.gate.logout(&init.context).await;
        if !cleanup.success {
            slog::debug!(init.context.logger, "Session cleanup after failed check did not succeed");
        }
    }

    match check.state {
        SessionState::Authenticated => {
            let identity = init.gate.current_identity();
            super::print(&serde_json::json!({
                "check": check,
                "identity": identity,
            }))?;
            Ok(())
        }
        _ => {
            super::print(&check)?;
            anyhow::bail!(OperationFailed { command: "check" })
        }
    }
}

/// Sign in with email and password.
pub async fn login(args: LoginArgs, conf: Conf) -> Result<()> {
    let password = super::secret(args.password)?;
    let init = SessionInit::configure(conf).await?;
    let outcome = init.gate.login(&init.context, &args.email, &password).await;
    super::print(&outcome)?;
    if !outcome.success {
        anyhow::bail!(OperationFailed { command: "login" });
    }
    Ok(())
}

/// Terminate the current session.
pub async fn logout(conf: Conf) -> Result<()> {
    let init = SessionInit::configure(conf).await?;
    let outcome = init.gate.logout(&init.context).await;
    super::print(&outcome)?;
    if !outcome.success {
        anyhow::bail!(OperationFailed { command: "logout" });
    }
    Ok(())
}

/// Manage second factors of the signed in principal.
pub async fn mfa(command: MfaCommand, conf: Conf) -> Result<()> {
    let init = SessionInit::configure(conf).await?;
    let (command, success) = match command {
        MfaCommand::Disable { factor_id } => {
            let outcome = init
                .gate
                .disable_second_factor(&init.context, &factor_id)
                .await;
            super::print(&outcome)?;
            ("mfa disable", outcome.success)
        }
        MfaCommand::Enroll => match init.gate.enroll_second_factor(&init.context).await {
            Ok(enrollment) => {
                super::print(&enrollment)?;
                ("mfa enroll", true)
            }
            Err(error) => {
                super::print(&error)?;
                ("mfa enroll", false)
            }
        },
        MfaCommand::Verify { factor_id, code } => {
            let outcome = init
                .gate
                .verify_second_factor(&init.context, &factor_id, &code)
                .await;
            super::print(&outcome)?;
            ("mfa verify", outcome.success)
        }
    };
    if !success {
        anyhow::bail!(OperationFailed { command });
    }
    Ok(())
}

/// Change the password of the signed in principal.
pub async fn password(args: PasswordArgs, conf: Conf) -> Result<()> {
    let password = super::secret(args.password)?;
    let init = SessionInit::configure(conf).await?;
    let outcome = init.gate.update_password(&init.context, &password).await;
    super::print(&outcome)?;
    if !outcome.success {
        anyhow::bail!(OperationFailed { command: "password" });
    }
    Ok(())
}
