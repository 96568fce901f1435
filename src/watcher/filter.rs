use std::path::Path;

/// Case-insensitive file extension filter.
///
/// Shared by the watcher and the retention sweeper so both agree on which
/// files they own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    /// Lowercased, without the leading dot.
    extension: String,
}

impl ExtensionFilter {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new("dcm")
    }
}
