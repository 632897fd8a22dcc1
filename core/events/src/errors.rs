//! Errors returned by the repairdesk-events crate.

/// Errors dealing with events.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to encode the event payload.
    #[error("unable to encode event payload for event '{0}'")]
    // (code,)
    PayloadEncode(String),

    /// Unable to decode event payload into the specified type.
    #[error("unable to decode event payload into the specified type")]
    PayloadDecode,
}
