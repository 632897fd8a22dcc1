//! Role based access decision commands.
use anyhow::Result;

use repairdesk_auth::AccessEngine;
use repairdesk_conf::Conf;

use super::CanArgs;
use super::OperationFailed;

/// Decide if a role can perform an action on a resource and print the decision.
pub fn can(args: CanArgs, conf: Conf) -> Result<()> {
    let engine = AccessEngine::new(conf.access.rule_table());
    let decision = engine.can(args.role.as_deref(), &args.resource, args.action);
    super::print(&decision)?;
    if !decision.allowed() {
        anyhow::bail!(OperationFailed { command: "can" });
    }
    Ok(())
}

/// Print the effective access rule table as YAML.
pub fn rules(conf: Conf) -> Result<()> {
    let rules = conf.access.rule_table();
    let rules = serde_yaml::to_string(&rules)?;
    print!("{}", rules);
    Ok(())
}
