//! Reading text files into documents.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::Result;

/// Extensions read by default.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["txt", "md", "text", "log", "csv"];

/// Reads UTF-8 text files into one [`Document`] each.
///
/// Every document carries `filename`, `source_path`, `file_type` (`"text"`)
/// and `file_size` metadata. `source_path` is relative to the base
/// directory and prefixed with the base directory's name (`corpus/a/b.md`),
/// and doubles as the document id.
#[derive(Debug, Clone)]
pub struct TextReader {
    base_dir: Option<PathBuf>,
    extensions: Vec<String>,
}

impl Default for TextReader {
    fn default() -> Self {
        Self { base_dir: None, extensions: DEFAULT_EXTENSIONS.map(String::from).to_vec() }
    }
}

impl TextReader {
    /// A reader with the default extensions and no base directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `source_path` relative to `base_dir`.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Replace the accepted extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(|e| e.into().to_ascii_lowercase()).collect();
        self
    }

    /// Whether `path` has one of the accepted extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn source_path(&self, path: &Path, filename: &str) -> String {
        let Some(base) = &self.base_dir else {
            return filename.to_string();
        };
        match path.strip_prefix(base) {
            Ok(relative) => {
                let prefix = base.file_name().map(PathBuf::from).unwrap_or_default();
                prefix.join(relative).to_string_lossy().replace('\\', "/")
            }
            Err(_) => filename.to_string(),
        }
    }

    /// Read one file.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::IoError`](crate::KnowledgeError::IoError)
    /// if the file cannot be read or is not valid UTF-8.
    pub async fn read_file(&self, path: &Path) -> Result<Document> {
        let content = tokio::fs::read_to_string(path).await?;
        let file_size = tokio::fs::metadata(path).await?.len();
        let filename =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let source_path = self.source_path(path, &filename);

        debug!(source_path = %source_path, file_size, "read text file");
        Ok(Document::new(source_path.clone(), content)
            .with_metadata("filename", filename)
            .with_metadata("source_path", source_path)
            .with_metadata("file_type", "text")
            .with_metadata("file_size", Value::from(file_size)))
    }

    /// Read every accepted file under `dir`, in path order.
    ///
    /// Files that cannot be read are logged and skipped.
    pub async fn read_dir(&self, dir: &Path) -> Result<Vec<Document>> {
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            )
            .into());
        }

        let mut files = WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.accepts(entry.path()))
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            match self.read_file(&file).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!(path = %file.display(), error = %e, "skipping unreadable file"),
            }
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[tokio::test]
    async fn reads_accepted_files_with_source_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("corpus");
        fs::create_dir_all(base.join("nested")).unwrap();
        fs::write(base.join("a.txt"), "alpha").unwrap();
        fs::write(base.join("nested/b.md"), "# beta").unwrap();
        fs::write(base.join("image.png"), [0u8, 1, 2]).unwrap();

        let reader = TextReader::new().with_base_dir(&base);
        let documents = reader.read_dir(&base).await.unwrap();

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["corpus/a.txt", "corpus/nested/b.md"]);
        let b = &documents[1];
        assert_eq!(b.metadata["filename"], "b.md");
        assert_eq!(b.metadata["source_path"], "corpus/nested/b.md");
        assert_eq!(b.metadata["file_type"], "text");
        assert_eq!(b.metadata["file_size"], 6);
    }

    #[tokio::test]
    async fn without_base_dir_the_filename_is_the_source() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.log");
        fs::write(&path, "entry").unwrap();

        let document = TextReader::new().read_file(&path).await.unwrap();
        assert_eq!(document.id, "notes.log");
        assert_eq!(document.content, "entry");
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let reader = TextReader::new().with_extensions(["MD"]);
        assert!(reader.accepts(Path::new("README.md")));
        assert!(!reader.accepts(Path::new("notes.txt")));
    }
}
