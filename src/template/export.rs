use super::{RowContext, TemplateSettings};
use crate::table::Table;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DEFAULT_EXPORT_BASE: &str = "template";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to build archive {path}: {source}")]
    Archive { path: PathBuf, source: ZipError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkDocument {
    pub file_name: String,
    pub contents: String,
}

pub fn export_base(list_name: &str) -> &str {
    let base = list_name.trim();
    if base.is_empty() {
        DEFAULT_EXPORT_BASE
    } else {
        base
    }
}

pub fn archive_file_name(base: &str) -> String {
    format!("{}.zip", sanitize_file_name(base))
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            _ => ch,
        })
        .collect()
}

fn entry_name(pattern: &str, context: &RowContext<'_>, base: &str, extension: &str) -> String {
    let rendered = if pattern.is_empty() {
        String::new()
    } else {
        sanitize_file_name(context.substitute(pattern).trim())
    };
    match rendered.as_str() {
        "" | "." | ".." => format!(
            "{}_{}.{extension}",
            sanitize_file_name(base),
            context.ordinal()
        ),
        _ => rendered,
    }
}

/// Entry names are unique within one export. A name already taken by an
/// earlier row gets that row's ordinal prefixed.
pub fn bulk_documents(settings: &TemplateSettings, table: &Table, base: &str) -> Vec<BulkDocument> {
    let template = settings.active();
    let pattern = settings.filename.trim();
    let extension = settings.kind.extension();
    let mut taken = HashSet::new();
    let mut documents = Vec::with_capacity(table.data_len());

    for (ordinal, row) in table.data_rows() {
        let context = RowContext::new(table.header(), row, ordinal);
        let mut file_name = entry_name(pattern, &context, base, extension);
        while !taken.insert(file_name.clone()) {
            file_name = format!("{ordinal}_{file_name}");
        }
        documents.push(BulkDocument {
            file_name,
            contents: template.render_row(&context),
        });
    }
    documents
}

fn write_entries(path: &Path, documents: &[BulkDocument]) -> Result<(), ExportError> {
    let io_error = |source: io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let archive_error = |source: ZipError| ExportError::Archive {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for document in documents {
        writer
            .start_file(document.file_name.as_str(), options)
            .map_err(archive_error)?;
        writer
            .write_all(document.contents.as_bytes())
            .map_err(io_error)?;
    }
    writer.finish().map_err(archive_error)?;
    Ok(())
}

pub fn write_archive(path: &Path, documents: &[BulkDocument]) -> Result<(), ExportError> {
    let tmp_path = path.with_extension("zip.tmp");
    let result = write_entries(&tmp_path, documents).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    info!(
        count = documents.len(),
        archive = %path.display(),
        "wrote bulk documents"
    );
    Ok(())
}
