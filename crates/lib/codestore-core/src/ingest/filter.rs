use std::collections::BTreeSet;

/// Extensions that are never indexed, lowercase with the leading dot.
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".ico", ".svg", // images
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", // video
    ".mp3", ".wav", ".ogg", ".aac", ".flac", ".wma", // audio
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".odt", ".ods", ".odp", // documents
    ".zip", ".rar", ".tar", ".gz", ".7z", // archives
    ".exe", ".dll", ".app", ".apk", ".iso", ".img", ".dmg", // binaries
];

/// Returns the lowercase extension of a file name, including its dot.
///
/// Leading dots do not start an extension, so `.gitignore` has none and
/// `archive.tar.gz` yields `.gz`.
#[must_use]
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    let stem_start = base.len() - base.trim_start_matches('.').len();
    let dot = base[stem_start..].rfind('.')? + stem_start;
    Some(base[dot..].to_ascii_lowercase())
}

/// Extension denylist applied during the ingestion walk.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    skipped: BTreeSet<String>,
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self {
            skipped: DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }
}

impl ExtensionFilter {
    /// Default denylist plus `extra`; entries may omit the leading dot.
    #[must_use]
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for ext in extra {
            let ext = ext.as_ref().trim().to_ascii_lowercase();
            if ext.is_empty() || ext == "." {
                continue;
            }
            if ext.starts_with('.') {
                filter.skipped.insert(ext);
            } else {
                filter.skipped.insert(format!(".{ext}"));
            }
        }
        filter
    }

    #[must_use]
    pub fn is_skipped(&self, file_name: &str) -> bool {
        file_extension(file_name).is_some_and(|ext| self.skipped.contains(&ext))
    }
}
