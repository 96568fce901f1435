//! Sweep command: one retention pass, on demand.

use std::io::Write;
use std::time::SystemTime;

use crate::config::Settings;
use crate::retention::{RetentionPolicy, SweepReport};
use crate::routing::RoutingTable;
use crate::watcher::ExtensionFilter;

pub fn write_report(
    out: &mut impl Write,
    report: &SweepReport,
    dry_run: bool,
) -> std::io::Result<()> {
    let verb = if dry_run { "Would delete" } else { "Deleted" };
    for path in &report.expired {
        writeln!(out, "{verb}: {}", path.display())?;
    }
    for dir in &report.pruned {
        writeln!(out, "Removed empty directory: {}", dir.display())?;
    }
    writeln!(
        out,
        "{} scanned, {} expired, {} directories removed, {} errors",
        report.scanned,
        report.expired.len(),
        report.pruned.len(),
        report.errors
    )
}

/// Run sweep command.
pub fn run(settings: &Settings, table: &RoutingTable, dry_run: bool) -> anyhow::Result<()> {
    let policy = RetentionPolicy::new(
        table.watch_dirs(),
        ExtensionFilter::new(&settings.extension),
        settings.retention.max_age_days,
    );
    let report = policy.sweep(SystemTime::now(), dry_run);

    let stdout = std::io::stdout();
    write_report(&mut stdout.lock(), &report, dry_run)?;

    if report.errors > 0 {
        anyhow::bail!("sweep finished with {} errors", report.errors);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_dry_run_wording() {
        let report = SweepReport {
            scanned: 3,
            expired: vec![PathBuf::from("/d/old.dcm")],
            pruned: Vec::new(),
            errors: 0,
        };
        let mut out = Vec::new();
        write_report(&mut out, &report, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Would delete: /d/old.dcm"));
        assert!(text.contains("3 scanned, 1 expired"));
    }
}
