//! ZIP packaging of extracted payslip pages.
//!
//! Both layouts are pure functions of their input and produce byte-identical
//! output for identical input (entry timestamps are pinned).

use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{PayslipError, Result};

/// A file destined for an archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Replaces spaces and path separators so a collaborator name can be used as
/// a single path component.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => sanitized,
    }
}

/// Flat layout: one entry per item, named after the item's file name.
///
/// Entries sharing a file name collapse into one; the last item wins.
pub fn build(items: &IndexMap<String, ArchiveItem>) -> Result<Vec<u8>> {
    let mut entries: IndexMap<String, &[u8]> = IndexMap::new();
    for item in items.values() {
        entries.insert(item.file_name.clone(), &item.content);
    }
    write_zip(&entries)
}

/// Grouped layout: `{sanitized collaborator}/{file name}` for every month.
pub fn build_grouped(items: &IndexMap<String, BTreeMap<u32, ArchiveItem>>) -> Result<Vec<u8>> {
    let mut entries: IndexMap<String, &[u8]> = IndexMap::new();
    for (collaborator, months) in items {
        let folder = sanitize_component(collaborator);
        for item in months.values() {
            entries.insert(format!("{folder}/{}", item.file_name), &item.content);
        }
    }
    write_zip(&entries)
}

fn write_zip(entries: &IndexMap<String, &[u8]>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        for (path, content) in entries {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(content)?;
        }

        zip.finish()?;
    }

    debug!("Built archive with {} entries ({} bytes)", entries.len(), buffer.len());

    Ok(buffer)
}

/// Writes the flat layout to `dir`, one file per item.
///
/// Returns the number of files written.
pub fn write_to_dir(dir: &Path, items: &IndexMap<String, ArchiveItem>) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut written = 0;
    for item in items.values() {
        std::fs::write(dir.join(safe_file_name(&item.file_name)?), &item.content)?;
        written += 1;
    }
    Ok(written)
}

/// Writes the grouped layout to `dir`, one sub-directory per collaborator.
pub fn write_grouped_to_dir(
    dir: &Path,
    items: &IndexMap<String, BTreeMap<u32, ArchiveItem>>,
) -> Result<usize> {
    let mut written = 0;
    for (collaborator, months) in items {
        let folder = dir.join(sanitize_component(collaborator));
        std::fs::create_dir_all(&folder)?;
        for item in months.values() {
            std::fs::write(folder.join(safe_file_name(&item.file_name)?), &item.content)?;
            written += 1;
        }
    }
    Ok(written)
}

fn safe_file_name(file_name: &str) -> Result<&str> {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| *name == file_name)
        .ok_or_else(|| {
            PayslipError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing to write {file_name:?} outside the target directory"),
            ))
        })
}
