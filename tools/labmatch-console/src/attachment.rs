use std::path::Path;

use anyhow::{bail, Context};

use labmatch_common::chat::Attachment;

/// Largest file the console will upload.
pub const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// Read a file from disk as a chat attachment.
pub fn load(path: &Path) -> anyhow::Result<Attachment> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        bail!(
            "{} is {} bytes, over the {} byte limit",
            path.display(),
            bytes.len(),
            MAX_ATTACHMENT_BYTES
        );
    }
    let content_type = content_type_for(&file_name);
    Ok(Attachment::new(file_name, content_type, bytes))
}

/// MIME type from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_file_with_type_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sequencing Run.CSV");
        std::fs::write(&path, b"sample,reads\nS1,120000\n").unwrap();

        let attachment = load(&path).unwrap();

        assert_eq!(attachment.file_name, "Sequencing Run.CSV");
        assert_eq!(attachment.content_type, "text/csv");
        assert_eq!(attachment.size(), 23);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.pdf")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn unknown_extensions_are_binary() {
        assert_eq!(content_type_for("raw.fastq"), "application/octet-stream");
        assert_eq!(content_type_for("README"), "application/octet-stream");
        assert_eq!(content_type_for("scan.JPeG"), "image/jpeg");
    }
}
