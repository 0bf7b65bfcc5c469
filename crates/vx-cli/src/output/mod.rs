//! Output formatting utilities for the CLI
//!
//! Tables for vendor listings, the connectivity state display and colored
//! status messages.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use vx_core::{Connectivity, ConnectivityState};
use vx_directory::{ServerEntry, VendorDirectory};

/// Format vendor directories as an ASCII table
///
/// Returns "No vendors configured" when the list is empty.
pub fn format_vendors(vendors: &[&VendorDirectory]) -> String {
    if vendors.is_empty() {
        return "No vendors configured".to_string();
    }

    #[derive(Tabled)]
    struct VendorRow {
        #[tabled(rename = "VENDOR")]
        name: String,
        #[tabled(rename = "LEVELS")]
        levels: String,
        #[tabled(rename = "RESOLVED")]
        resolve: String,
        #[tabled(rename = "EXITS")]
        exits: usize,
    }

    let rows: Vec<VendorRow> = vendors
        .iter()
        .map(|v| VendorRow {
            name: v.name.clone(),
            levels: if v.levels.is_empty() {
                "-".to_string()
            } else {
                v.levels.join(" > ")
            },
            resolve: if v.resolve { "yes" } else { "no" }.to_string(),
            exits: v.endpoint_count(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format the connectivity state for humans
pub fn format_state(state: &ConnectivityState) -> String {
    let mut output = String::new();

    output.push_str(&format!("VPN: {}\n", state.label));
    output.push_str(&format!(
        "Vendor: {}\n",
        state.vendor.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!("Exit: {}\n", state.exit.as_deref().unwrap_or("-")));
    if !state.path.is_empty() {
        output.push_str(&format!("Path: {}\n", state.path.join(" > ")));
    }
    if !state.status_text.trim().is_empty() {
        output.push('\n');
        output.push_str(state.status_text.trim_end());
        output.push('\n');
    }

    output
}

/// Format a key path; the empty path is the vendor root
pub fn format_path(path: &[String]) -> String {
    if path.is_empty() {
        "(top level)".to_string()
    } else {
        path.join(" > ")
    }
}

/// One server per line, followed by its addresses when they differ from it
pub fn format_server_entries(entries: &[ServerEntry]) -> String {
    let mut output = String::new();
    for entry in entries {
        output.push_str(&entry.name);
        if entry.addresses != [entry.name.clone()] {
            output.push_str(&format!(" ({})", entry.addresses.join(", ")));
        }
        output.push('\n');
    }
    output
}

/// Print a tri-state result with the matching message style
pub fn print_connectivity(connectivity: Connectivity) {
    match connectivity {
        Connectivity::Up => print_success(connectivity.label()),
        Connectivity::Down => print_error(connectivity.label()),
        Connectivity::Unknown => print_warning(connectivity.label()),
    }
}

/// Print a success message in green with a checkmark prefix
///
/// Used for an `Up` connectivity result.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix, on stderr
///
/// Covers a `Down` connectivity result and exits missing from a directory.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning in yellow on stderr, for an `Unknown` connectivity result
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
