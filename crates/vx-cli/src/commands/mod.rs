//! CLI command implementations

mod directory;
mod router;
mod watch;

pub use directory::{
    find_command, levels_command, servers_command, tree_command, vendors_command,
};
pub use router::{check_command, select_command, status_command};
pub use watch::watch_command;
