//! Front-end client for the `dilensd` dependency lookup backend.
//!
//! The backend has to boot inside the application to introspect its
//! container, which takes a while. The [`Coordinator`] therefore starts a
//! placeholder that answers every query with "nothing known" and swaps in a
//! live [`RequestClient`] once the backend has launched and completed its
//! handshake. Hosts always go through [`Coordinator::client`] and never block
//! on the boot.

mod bootstrap;
mod client;
mod error;
mod notify;
mod placeholder;
mod relay;
mod request_client;
mod settings;
pub mod supervisor;
mod watch;

pub use bootstrap::{Activation, BootState, Booter, Coordinator, ProcessBooter, create_client};
pub use client::DependencyClient;
pub use error::{BootError, InitializationError, LaunchError, RequestError};
pub use notify::{ChannelNotifier, HostEvent, LogLevel, Notifier, TracingNotifier};
pub use placeholder::PlaceholderClient;
pub use request_client::RequestClient;
pub use settings::ClientSettings;
pub use watch::requires_reload;

#[cfg(all(test, unix))]
mod tests;
