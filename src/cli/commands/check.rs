//! Check command: show the effective configuration.

use std::io::Write;

use crate::config::Settings;
use crate::routing::RoutingTable;

/// Write the effective settings and the routing table to `out`.
pub fn write_report(
    out: &mut impl Write,
    settings: &Settings,
    table: &RoutingTable,
) -> anyhow::Result<()> {
    writeln!(out, "Current Configuration:")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "{}", settings.to_toml()?)?;

    writeln!(out, "Routing Rules ({}):", table.len())?;
    writeln!(out, "{}", "=".repeat(50))?;
    for rule in table.rules() {
        writeln!(
            out,
            "{}  {:?} [{}] -> {}",
            rule.watch_dir.display(),
            rule.description,
            rule.pattern,
            rule.endpoint
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Watched Directories:")?;
    for dir in table.watch_dirs() {
        let state = if dir.is_dir() { "" } else { "  (missing)" };
        writeln!(out, "  {}{state}", dir.display())?;
    }
    Ok(())
}

/// Run check command.
pub fn run(settings: &Settings, table: &RoutingTable) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    write_report(&mut stdout.lock(), settings, table)
}
