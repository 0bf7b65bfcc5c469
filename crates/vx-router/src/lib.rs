//! vx-router: Router lifecycle control
//!
//! Reconfigures a router's VPN to tunnel through a chosen exit. The
//! router is reached either by running commands locally or over SSH; both
//! sit behind [`CommandRunner`]. [`RouterTransport`] renders and installs
//! the vendor config, restarts the tunnel and probes it, and
//! [`SessionController`] sequences those steps for an exit selection while
//! publishing the resulting [`vx_core::ConnectivityState`].

pub mod controller;
pub mod exec;
pub mod ssh;
pub mod state;
pub mod transport;

pub use controller::SessionController;
pub use exec::{CommandRunner, LocalRunner};
pub use ssh::SshRunner;
pub use state::{ConnectivityPublisher, ConnectivityReader};
pub use transport::{vendor_templates, RouterTransport, Selection, POLL_INTERVAL};
