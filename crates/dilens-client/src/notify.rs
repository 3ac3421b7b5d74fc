//! Host notification channel.
//!
//! Everything the client wants the user to see (backend diagnostics, boot
//! failures, query errors) is published as a [`HostEvent`] through a
//! [`Notifier`] supplied by the host at activation.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use strum::{Display, EnumString};

const NOTIFY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::notify");

/// Severity attached to a host log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    /// Something failed.
    Error,
    /// Degraded behaviour the user should know about.
    Warning,
    /// Informational message.
    Info,
    /// Verbose output, such as relayed backend diagnostics.
    Log,
}

/// An event delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A line for the host's log window.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text without a trailing newline.
        message: String,
    },
}

impl HostEvent {
    /// Builds a log event.
    #[must_use]
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }
}

/// Sink for host-visible events.
pub trait Notifier: Send + Sync {
    /// Publishes one event. Must not block for long.
    fn notify(&self, event: HostEvent);
}

impl<T> Notifier for Arc<T>
where
    T: Notifier + ?Sized,
{
    fn notify(&self, event: HostEvent) {
        (**self).notify(event);
    }
}

/// Notifier that forwards events over a standard channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<HostEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end for the host.
    #[must_use]
    pub fn new() -> (Self, Receiver<HostEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: HostEvent) {
        if let Err(error) = self.sender.send(event) {
            tracing::debug!(
                target: NOTIFY_TARGET,
                event = ?error.0,
                "host receiver dropped; discarding event"
            );
        }
    }
}

/// Notifier that records events with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: HostEvent) {
        let HostEvent::Log { level, message } = event;
        match level {
            LogLevel::Error => tracing::error!(target: NOTIFY_TARGET, "{message}"),
            LogLevel::Warning => tracing::warn!(target: NOTIFY_TARGET, "{message}"),
            LogLevel::Info => tracing::info!(target: NOTIFY_TARGET, "{message}"),
            LogLevel::Log => tracing::debug!(target: NOTIFY_TARGET, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn channel_notifier_delivers_in_order() {
        let (notifier, receiver) = ChannelNotifier::new();

        notifier.notify(HostEvent::log(LogLevel::Info, "first"));
        notifier.notify(HostEvent::log(LogLevel::Error, "second"));

        let received: Vec<HostEvent> = receiver.try_iter().collect();
        assert_eq!(
            received,
            vec![
                HostEvent::log(LogLevel::Info, "first"),
                HostEvent::log(LogLevel::Error, "second"),
            ]
        );
    }

    #[rstest]
    fn dropped_receiver_does_not_panic() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);

        notifier.notify(HostEvent::log(LogLevel::Warning, "ignored"));
    }
}
