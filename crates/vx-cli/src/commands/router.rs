//! Router commands

use anyhow::Result;

use crate::context::Context;
use crate::output::{format_state, print_connectivity, print_error, print_success};

/// Point the router at a new exit
pub async fn select_command(ctx: &Context, vendor: &str, exit: &str, json: bool) -> Result<()> {
    let controller = ctx.controller().await?;

    match controller.select_exit(vendor, exit).await {
        Ok(state) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_success(&format!("Now using {} exit {}", vendor, exit));
                print!("{}", format_state(&state));
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
            }
            print_error(&format!("Unable to select {} exit {}: {}", vendor, exit, e));
            Err(e.into())
        }
    }
}

/// Run the health check once
pub async fn check_command(ctx: &Context) -> Result<()> {
    let controller = ctx.controller().await?;
    print_connectivity(controller.check().await);
    Ok(())
}

/// Show the router's VPN status output
pub async fn status_command(ctx: &Context) -> Result<()> {
    let controller = ctx.controller().await?;
    match controller.refresh_status().await {
        Ok(text) => {
            print!("{}", text);
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Failed to get VPN status: {}", e));
            Err(e.into())
        }
    }
}
