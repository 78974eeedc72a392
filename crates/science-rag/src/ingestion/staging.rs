//! Scoped staging of uploaded files
//!
//! Payloads are written to a private temporary directory before they are
//! handed to the document service. The directory is removed when the
//! `StagingArea` is dropped, whatever path the request took.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::error::Result;
use crate::types::UploadDocument;

/// A file written into the staging area
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Name the document will carry in the dataset
    pub display_name: String,
    /// Location on disk, unique even when display names collide
    pub path: PathBuf,
    pub size: u64,
}

/// Temporary directory holding one request's uploads
pub struct StagingArea {
    dir: TempDir,
    files: Vec<StagedFile>,
}

impl StagingArea {
    /// Create an empty staging directory
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("science-rag-upload-")
            .tempdir()?;
        tracing::debug!("Staging uploads in {}", dir.path().display());
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    /// Directory backing this area
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Write one payload to disk
    pub async fn stage(&mut self, filename: Option<&str>, data: &[u8]) -> Result<&StagedFile> {
        let display_name = display_name(filename);
        // index prefix keeps same-named uploads apart on disk
        let path = self
            .dir
            .path()
            .join(format!("{:04}_{}", self.files.len(), display_name));

        tokio::fs::write(&path, data).await?;

        self.files.push(StagedFile {
            display_name,
            path,
            size: data.len() as u64,
        });
        Ok(&self.files[self.files.len() - 1])
    }

    /// Read every staged file back as an upload payload, in staging order
    pub async fn load_documents(&self) -> Result<Vec<UploadDocument>> {
        let mut documents = Vec::with_capacity(self.files.len());
        for file in &self.files {
            documents.push(UploadDocument {
                display_name: file.display_name.clone(),
                blob: tokio::fs::read(&file.path).await?,
            });
        }
        Ok(documents)
    }

    /// Remove the directory now and report failures
    ///
    /// Dropping the area removes it too, silently.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

/// Reduce a client-supplied file name to its last path component
fn display_name(filename: Option<&str>) -> String {
    filename
        .map(|name| name.replace('\\', "/"))
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("file_{}.bin", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_directories() {
        assert_eq!(display_name(Some("a.txt")), "a.txt");
        assert_eq!(display_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(display_name(Some("C:\\docs\\report.pdf")), "report.pdf");

        let generated = display_name(Some("  "));
        assert!(generated.starts_with("file_") && generated.ends_with(".bin"));
        assert!(display_name(None).starts_with("file_"));
    }

    #[tokio::test]
    async fn test_stage_and_load() {
        let mut area = StagingArea::new().unwrap();
        area.stage(Some("a.txt"), b"Hello world").await.unwrap();
        area.stage(Some("a.txt"), b"Second a").await.unwrap();
        area.stage(Some("b.txt"), b"Goodbye world").await.unwrap();

        assert_eq!(area.len(), 3);
        let docs = area.load_documents().await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "a.txt", "b.txt"]);
        assert_eq!(docs[1].blob, b"Second a");
        assert_eq!(area.files()[2].size, 13);
    }

    #[tokio::test]
    async fn test_directory_removed_on_drop() {
        let dir = {
            let mut area = StagingArea::new().unwrap();
            area.stage(Some("a.txt"), b"data").await.unwrap();
            area.path().to_path_buf()
        };
        assert!(!dir.exists());

        let area = StagingArea::new().unwrap();
        let dir = area.path().to_path_buf();
        area.close().unwrap();
        assert!(!dir.exists());
    }
}
