use salsa_core::stage::Stage;

/// Read side of a running alert service, for query front ends.
pub trait StageMonitor: Send + Sync {
    /// `None` until the first successful poll.
    fn current_stage(&self) -> Option<Stage>;

    /// Asks for an out-of-band re-poll. Returns `false` once the service
    /// has stopped.
    fn request_resync(&self) -> bool;
}
