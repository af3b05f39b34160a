use crate::config::Layout;

/// Where a PDF is in its life cycle. Only `Downloaded` and `Archived` are
/// persisted, as file presence in the intake and archive directories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PdfState {
    Discovered,
    Downloading,
    Downloaded,
    Extracted,
    Archived,
}

impl PdfState {
    pub fn as_str(&self) -> &str {
        match self {
            PdfState::Discovered => "discovered",
            PdfState::Downloading => "downloading",
            PdfState::Downloaded => "downloaded",
            PdfState::Extracted => "extracted",
            PdfState::Archived => "archived",
        }
    }

    /// Persisted state of `name`. The archive wins over the intake.
    pub fn locate(layout: &Layout, name: &str) -> Self {
        if layout.archive_path(name).exists() {
            PdfState::Archived
        } else if layout.intake_path(name).exists() {
            PdfState::Downloaded
        } else {
            PdfState::Discovered
        }
    }

    /// True once a file by this name sits in either directory.
    pub fn is_known(&self) -> bool {
        matches!(self, PdfState::Downloaded | PdfState::Archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn locate_reads_directories() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().join("in"), tmp.path().join("in/processed"));
        fs::create_dir_all(&layout.archive).unwrap();

        assert_eq!(PdfState::locate(&layout, "a.pdf"), PdfState::Discovered);
        assert!(!PdfState::Discovered.is_known());

        fs::write(layout.intake_path("a.pdf"), b"x").unwrap();
        assert_eq!(PdfState::locate(&layout, "a.pdf"), PdfState::Downloaded);

        fs::write(layout.archive_path("a.pdf"), b"x").unwrap();
        assert_eq!(PdfState::locate(&layout, "a.pdf"), PdfState::Archived);
        assert!(PdfState::Archived.is_known());
        assert_eq!(PdfState::Archived.as_str(), "archived");
    }
}
