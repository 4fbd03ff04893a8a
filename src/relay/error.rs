use crate::panel::PanelError;

/// Errors returned by the relay channel to the coordinator.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// The coordinator task has stopped
    #[error("coordinator is not running")]
    Closed,

    /// The coordinator dropped the request without answering
    #[error("coordinator dropped the request without replying")]
    NoReply,

    /// Opening or focusing the panel failed
    #[error("panel request failed: {0}")]
    Panel(#[from] PanelError),
}
