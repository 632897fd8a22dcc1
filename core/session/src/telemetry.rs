//! Telemetry related to session and identity operations.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::CounterVec;
use prometheus::Opts;

/// Total number of login attempts, by resulting session state.
pub static LOGIN_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "repairdesk_session_login_count",
            "Total number of login attempts, by resulting session state",
        ),
        &["state"],
    )
    .expect("failed to initialise LOGIN_COUNT counter")
});

/// Total number of session checks, by resulting session state.
pub static CHECK_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "repairdesk_session_check_count",
            "Total number of session checks, by resulting session state",
        ),
        &["state"],
    )
    .expect("failed to initialise CHECK_COUNT counter")
});

/// Number of remote service calls that resulted in error, by operation.
pub static CALL_ERR: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "repairdesk_session_call_error",
            "Number of remote service calls that resulted in error, by operation",
        ),
        &["operation"],
    )
    .expect("failed to initialise CALL_ERR counter")
});

/// Total number of second factor operations, by operation and outcome.
pub static FACTOR_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "repairdesk_session_factor_count",
            "Total number of second factor operations, by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("failed to initialise FACTOR_COUNT counter")
});

/// Ensure metrics are registered only once.
static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// The first time this method is called it will register the session gate metrics.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    // Skip registration if already done before.
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(CALL_ERR.clone()),
        Box::new(CHECK_COUNT.clone()),
        Box::new(FACTOR_COUNT.clone()),
        Box::new(LOGIN_COUNT.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}

/// Label for the outcome of an operation.
pub(crate) fn outcome_label(success: bool) -> &'static str {
    match success {
        true => "success",
        false => "failed",
    }
}
