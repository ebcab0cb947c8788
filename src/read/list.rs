//! Directory-style listing over an opened archive.

use super::Archive;

use std::io::{Read, Seek};
use std::path::Path;

/// Where a listed file lives. Kept as a tag so callers can mix archive
/// members with loose files in a single list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTag {
    InArchive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub tag: FileTag,
}

impl<R: Read + Seek> Archive<R> {
    /// Enumerates file entries, skipping directories.
    ///
    /// With a filter, only names whose extension matches one of the given
    /// ones (case-insensitively, written without the leading dot) are kept;
    /// names without any extension never match a filter.
    pub fn list_files(&self, extension_filter: Option<&[String]>) -> Vec<ListedFile> {
        return self
            .index
            .files
            .iter()
            .filter(|f| !f.is_directory)
            .filter(|f| match extension_filter {
                None => true,
                Some(wanted) => match Path::new(&f.name).extension().and_then(|e| e.to_str()) {
                    Some(ext) => wanted.iter().any(|w| w.eq_ignore_ascii_case(ext)),
                    None => false,
                },
            })
            .map(|f| ListedFile {
                name: f.name.clone(),
                tag: FileTag::InArchive,
            })
            .collect();
    }
}
