//! Hosting context port.

/// The screen or process hosting the capture session.
pub trait HostContext: Send + Sync {
    /// Ends the hosting context after an unrecoverable device error.
    fn finish(&self);
}
