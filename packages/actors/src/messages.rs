//! Message types for the dispatcher actor.

/// Messages for the [`DispatcherActor`](crate::DispatcherActor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherMessage {
    /// A job was admitted; drain the queue if idle.
    Wake,

    /// Periodic tick: drain anything missed and purge expired results.
    Tick,

    /// Stop after the current message.
    Shutdown,
}
