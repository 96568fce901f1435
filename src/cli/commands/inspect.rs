//! Inspect command: dry routing of individual files.

use std::io::Write;
use std::path::Path;

use crate::metadata::MetadataExtractor;
use crate::normalize::normalize;
use crate::routing::RoutingTable;

/// Describe how one file would be routed. Returns `false` if its metadata
/// could not be read.
pub fn inspect_file(
    out: &mut impl Write,
    path: &Path,
    extractor: &dyn MetadataExtractor,
    table: &RoutingTable,
    field: &str,
) -> std::io::Result<bool> {
    writeln!(out, "{}", path.display())?;

    let fields = match extractor.extract(path) {
        Ok(fields) => fields,
        Err(e) => {
            writeln!(out, "  error: {e}")?;
            return Ok(false);
        }
    };

    let value = fields.get(field);
    let key = normalize(value.unwrap_or_default());
    match value {
        Some(v) => writeln!(out, "  {field}: {v:?}")?,
        None => writeln!(out, "  {field}: (absent)")?,
    }
    writeln!(out, "  key: {key:?}")?;

    let mut routed = false;
    for rule in table.matching(&key) {
        writeln!(out, "  -> {}", rule.endpoint)?;
        routed = true;
    }
    if !routed {
        writeln!(out, "  -> no matching rule")?;
    }
    Ok(true)
}

/// Run inspect command. Fails if any file could not be read.
pub fn run(
    files: &[impl AsRef<Path>],
    extractor: &dyn MetadataExtractor,
    table: &RoutingTable,
    field: &str,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0;
    for file in files {
        if !inspect_file(&mut out, file.as_ref(), extractor, table, field)? {
            failures += 1;
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} files could not be read", files.len());
    }
    Ok(())
}
