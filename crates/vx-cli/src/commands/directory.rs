//! Server directory commands

use anyhow::{anyhow, Result};
use vx_directory::VendorDirectory;

use crate::context::Context;
use crate::output::{format_path, format_server_entries, format_vendors, print_error};

/// List vendors with their hierarchy levels
pub async fn vendors_command(ctx: &Context) -> Result<()> {
    let (registry, _refresher) = ctx.directories().await?;
    let directories: Vec<_> = registry
        .vendors()
        .iter()
        .filter_map(|vendor| registry.get(vendor))
        .collect();
    let refs: Vec<&VendorDirectory> = directories.iter().map(|d| d.as_ref()).collect();

    println!("{}", format_vendors(&refs));
    Ok(())
}

/// Print a vendor's server tree
pub async fn tree_command(ctx: &Context, vendor: &str, json: bool) -> Result<()> {
    let (registry, _refresher) = ctx.directories().await?;
    let directory = registry
        .get(vendor)
        .ok_or_else(|| anyhow!("{} vendor is not defined", vendor))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&directory.root)?);
    } else {
        print!("{}", directory.render_outline());
    }
    Ok(())
}

/// Print the key path to an exit
pub async fn find_command(ctx: &Context, vendor: &str, exit: &str) -> Result<()> {
    let (registry, _refresher) = ctx.directories().await?;
    let directory = registry
        .get(vendor)
        .ok_or_else(|| anyhow!("{} vendor is not defined", vendor))?;

    match directory.find_path(exit) {
        Some(path) => {
            println!("{}", format_path(&path));
            Ok(())
        }
        None => {
            print_error(&format!("{} is not a known {} exit", exit, vendor));
            Err(anyhow!("exit not found"))
        }
    }
}

/// List the keys one level below `path`, under that level's label
pub async fn levels_command(ctx: &Context, vendor: &str, path: &[String]) -> Result<()> {
    let (registry, _refresher) = ctx.directories().await?;
    let directory = registry
        .get(vendor)
        .ok_or_else(|| anyhow!("{} vendor is not defined", vendor))?;

    let Some(label) = directory.levels.get(path.len()) else {
        return Err(anyhow!(
            "{} holds servers, not levels; use `vpnexiter servers`",
            format_path(path)
        ));
    };
    let keys = directory.keys_at(path)?;

    println!("{}:", label);
    for key in keys {
        println!("  {}", key);
    }
    Ok(())
}

/// List the servers at `path` with the addresses they resolved to
pub async fn servers_command(
    ctx: &Context,
    vendor: &str,
    path: &[String],
    json: bool,
) -> Result<()> {
    let (registry, _refresher) = ctx.directories().await?;
    let directory = registry
        .get(vendor)
        .ok_or_else(|| anyhow!("{} vendor is not defined", vendor))?;
    let entries = directory.server_entries(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", format_server_entries(&entries));
    }
    Ok(())
}
