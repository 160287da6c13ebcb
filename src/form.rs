//! Form-state mirror: the selected file, the form controls, and the request
//! payloads built from them.
//!
//! Nothing here touches the network. [`snapshot`] is a pure read of the
//! controls at call time; callers take a fresh snapshot for every request
//! instead of caching one, so an edit made a millisecond before the debounce
//! timer fires is still picked up.

use crate::error::FoliatorError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Multipart field name the server reads the PDF from.
pub const FILE_FIELD: &str = "pdf_file";

/// Suffix appended to every control name in a preview request, so the
/// server can tell preview parameters from final-submission parameters.
pub const PREVIEW_SUFFIX: &str = "_prev";

/// The only media type the preview path accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const OCTET_STREAM: &str = "application/octet-stream";

// ── Selected file ────────────────────────────────────────────────────────

/// Where the bytes of a [`SelectedFile`] live.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Already in memory (drag-and-drop, tests).
    Memory(Arc<[u8]>),
    /// On disk; streamed when a request is built. Lets a multi-gigabyte file
    /// be validated from its metadata without loading it.
    Disk(PathBuf),
}

/// A file chosen by the user, with its declared size and media type.
///
/// Replaced wholesale on every new selection; never mutated in place.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    size: u64,
    media_type: String,
    content: FileContent,
}

impl SelectedFile {
    /// Wrap an in-memory payload. Media type is derived from the name, then
    /// from the `%PDF` magic bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = Arc::from(bytes.into());
        let media_type = if has_pdf_extension(&name) || bytes.starts_with(b"%PDF") {
            PDF_MEDIA_TYPE
        } else {
            OCTET_STREAM
        };
        Self {
            name,
            size: bytes.len() as u64,
            media_type: media_type.to_string(),
            content: FileContent::Memory(bytes),
        }
    }

    /// Build a file from explicit declarations, the way a browser hands a
    /// `File` over: size and type are whatever the platform reported.
    pub fn declared(
        name: impl Into<String>,
        size: u64,
        media_type: impl Into<String>,
        content: FileContent,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            media_type: media_type.into(),
            content,
        }
    }

    /// Select a file on disk. Only metadata and (when the extension is not
    /// `.pdf`) the first four bytes are read here.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FoliatorError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_to_input_error(&path, e))?;
        if !metadata.is_file() {
            return Err(FoliatorError::FileNotFound { path });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let media_type = if has_pdf_extension(&name) {
            PDF_MEDIA_TYPE
        } else if starts_with_pdf_magic(&path).await {
            PDF_MEDIA_TYPE
        } else {
            OCTET_STREAM
        };

        debug!(
            "Selected {} ({} bytes, {})",
            path.display(),
            metadata.len(),
            media_type
        );

        Ok(Self {
            name,
            size: metadata.len(),
            media_type: media_type.to_string(),
            content: FileContent::Disk(path),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// Whether the preview path accepts this file.
    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    /// Open the payload for sequential reading. Disk content is opened here
    /// and read chunk by chunk; nothing is buffered whole.
    pub async fn open(&self) -> Result<ContentReader, FoliatorError> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(ContentReader {
                len: bytes.len() as u64,
                source: ReaderSource::Memory {
                    bytes: Arc::clone(bytes),
                    offset: 0,
                },
            }),
            FileContent::Disk(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| io_to_input_error(path, e))?;
                let len = file
                    .metadata()
                    .await
                    .map_err(|e| io_to_input_error(path, e))?
                    .len();
                Ok(ContentReader {
                    len,
                    source: ReaderSource::Disk(file),
                })
            }
        }
    }
}

/// Reads a [`SelectedFile`]'s content in bounded chunks.
#[derive(Debug)]
pub struct ContentReader {
    len: u64,
    source: ReaderSource,
}

#[derive(Debug)]
enum ReaderSource {
    Memory { bytes: Arc<[u8]>, offset: usize },
    Disk(tokio::fs::File),
    Done,
}

impl ContentReader {
    /// Content length at open time. For disk files this is the current
    /// metadata, not the size declared at selection.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Next chunk of at most `max` bytes; `None` at end of content.
    /// After an error the reader is exhausted.
    pub async fn next_chunk(&mut self, max: usize) -> std::io::Result<Option<Vec<u8>>> {
        use tokio::io::AsyncReadExt;

        let chunk = match &mut self.source {
            ReaderSource::Memory { bytes, offset } => {
                if *offset >= bytes.len() {
                    None
                } else {
                    let end = (*offset + max).min(bytes.len());
                    let chunk = bytes[*offset..end].to_vec();
                    *offset = end;
                    Some(chunk)
                }
            }
            ReaderSource::Disk(file) => {
                let mut buf = vec![0u8; max];
                let read = file.read(&mut buf).await;
                match read {
                    Ok(0) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some(buf)
                    }
                    Err(e) => {
                        self.source = ReaderSource::Done;
                        return Err(e);
                    }
                }
            }
            ReaderSource::Done => None,
        };
        if chunk.is_none() {
            self.source = ReaderSource::Done;
        }
        Ok(chunk)
    }
}

/// Two selections are the same file when they share metadata and the same
/// underlying content (same buffer or same path).
impl PartialEq for SelectedFile {
    fn eq(&self, other: &Self) -> bool {
        let same_content = match (&self.content, &other.content) {
            (FileContent::Memory(a), FileContent::Memory(b)) => Arc::ptr_eq(a, b),
            (FileContent::Disk(a), FileContent::Disk(b)) => a == b,
            _ => false,
        };
        same_content
            && self.name == other.name
            && self.size == other.size
            && self.media_type == other.media_type
    }
}

fn has_pdf_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
}

async fn starts_with_pdf_magic(path: &Path) -> bool {
    use tokio::io::AsyncReadExt;
    let Ok(mut f) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut magic = [0u8; 4];
    f.read_exact(&mut magic).await.is_ok() && &magic == b"%PDF"
}

fn io_to_input_error(path: &Path, e: std::io::Error) -> FoliatorError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => FoliatorError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => FoliatorError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => FoliatorError::FileRead {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

// ── Controls ─────────────────────────────────────────────────────────────

/// The kind of form control, which decides whether it is mirrored into
/// snapshots and which events retrigger the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Number,
    Text,
    Select,
    Hidden,
    File,
}

impl ControlKind {
    /// Tracked controls appear in snapshots and retrigger the preview.
    pub fn is_tracked(self) -> bool {
        matches!(self, ControlKind::Number | ControlKind::Text | ControlKind::Select)
    }

    /// Number and text inputs retrigger on every keystroke, not just on
    /// change.
    pub fn fires_on_keystroke(self) -> bool {
        matches!(self, ControlKind::Number | ControlKind::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub kind: ControlKind,
    pub value: String,
}

impl Control {
    pub fn new(name: impl Into<String>, kind: ControlKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }
}

/// Every control of the form, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormControls {
    controls: Vec<Control>,
}

impl FormControls {
    pub fn new(controls: Vec<Control>) -> Self {
        Self { controls }
    }

    /// Append a control (e.g. a hidden CSRF token).
    pub fn push(&mut self, control: Control) {
        self.controls.push(control);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.value.as_str())
    }

    /// Overwrite a control's value. Returns the control's kind, or `None`
    /// when the form has no control of that name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Option<ControlKind> {
        let control = self.controls.iter_mut().find(|c| c.name == name)?;
        control.value = value.into();
        Some(control.kind)
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────

/// Ordered `name → value` pairs of every tracked control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    entries: Vec<(String, String)>,
}

impl ConfigurationSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the current value of every number, text and select control.
/// Hidden and file inputs are skipped.
pub fn snapshot(controls: &FormControls) -> ConfigurationSnapshot {
    ConfigurationSnapshot {
        entries: controls
            .iter()
            .filter(|c| c.kind.is_tracked())
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect(),
    }
}

/// One preview call: the file plus a snapshot, identified by a
/// monotonically increasing id.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub id: u64,
    pub file: SelectedFile,
    pub snapshot: ConfigurationSnapshot,
}

impl PreviewRequest {
    /// Multipart text fields, each name suffixed with [`PREVIEW_SUFFIX`].
    pub fn fields(&self) -> Vec<(String, String)> {
        self.snapshot
            .iter()
            .map(|(k, v)| (format!("{k}{PREVIEW_SUFFIX}"), v.to_string()))
            .collect()
    }
}

/// The final submission: the file plus every non-file control under its
/// canonical name, hidden ones included.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: SelectedFile,
    fields: Vec<(String, String)>,
}

impl UploadRequest {
    pub fn from_form(file: SelectedFile, controls: &FormControls) -> Self {
        Self {
            file,
            fields: controls
                .iter()
                .filter(|c| c.kind != ControlKind::File)
                .map(|c| (c.name.clone(), c.value.clone()))
                .collect(),
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampSettings;

    fn form_with_hidden() -> FormControls {
        let mut controls = StampSettings::default().to_controls();
        controls.push(Control::new("csrf_token", ControlKind::Hidden, "abc"));
        controls.push(Control::new(FILE_FIELD, ControlKind::File, ""));
        controls
    }

    #[test]
    fn snapshot_skips_hidden_and_file_controls() {
        let snap = snapshot(&form_with_hidden());
        assert_eq!(snap.len(), 7);
        assert!(snap.get("csrf_token").is_none());
        assert!(snap.get(FILE_FIELD).is_none());
    }

    #[test]
    fn snapshot_preserves_declaration_order() {
        let snap = snapshot(&form_with_hidden());
        let names: Vec<&str> = snap.iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            vec![
                "start_page",
                "end_page",
                "start_number",
                "font_size",
                "offset",
                "corner",
                "orientation"
            ]
        );
    }

    #[test]
    fn snapshot_reads_current_values() {
        let mut controls = form_with_hidden();
        let before = snapshot(&controls);
        controls.set("start_number", "42");
        let after = snapshot(&controls);
        assert_eq!(before.get("start_number"), Some("1"));
        assert_eq!(after.get("start_number"), Some("42"));
    }

    #[test]
    fn preview_fields_are_suffixed() {
        let controls = form_with_hidden();
        let req = PreviewRequest {
            id: 1,
            file: SelectedFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec()),
            snapshot: snapshot(&controls),
        };
        let fields = req.fields();
        assert!(fields.iter().all(|(k, _)| k.ends_with("_prev")));
        assert!(fields.contains(&("corner_prev".to_string(), "bottom-right".to_string())));
    }

    #[test]
    fn upload_fields_use_canonical_names_and_keep_hidden() {
        let controls = form_with_hidden();
        let file = SelectedFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec());
        let req = UploadRequest::from_form(file, &controls);
        assert!(req.fields().iter().any(|(k, v)| k == "csrf_token" && v == "abc"));
        assert!(req.fields().iter().all(|(k, _)| k != FILE_FIELD));
        assert!(req.fields().iter().all(|(k, _)| !k.ends_with("_prev")));
    }

    #[test]
    fn set_unknown_control_is_none() {
        let mut controls = form_with_hidden();
        assert_eq!(controls.set("nope", "1"), None);
        assert_eq!(controls.set("corner", "top-left"), Some(ControlKind::Select));
    }

    #[test]
    fn media_type_from_extension_or_magic() {
        assert!(SelectedFile::from_bytes("scan.PDF", vec![0u8; 4]).is_pdf());
        assert!(SelectedFile::from_bytes("noext", b"%PDF-1.4".to_vec()).is_pdf());
        assert!(!SelectedFile::from_bytes("photo.png", vec![0x89, b'P']).is_pdf());
    }

    #[test]
    fn clones_are_equal_distinct_buffers_are_not() {
        let a = SelectedFile::from_bytes("a.pdf", b"%PDF".to_vec());
        let b = SelectedFile::from_bytes("a.pdf", b"%PDF".to_vec());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn memory_content_reads_without_io() {
        let f = SelectedFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec());
        let chunks = tokio_test::block_on(async {
            let mut reader = f.open().await.unwrap();
            assert_eq!(reader.len(), 8);
            let mut chunks = Vec::new();
            while let Some(chunk) = reader.next_chunk(3).await.unwrap() {
                chunks.push(chunk);
            }
            chunks
        });
        assert_eq!(chunks, vec![b"%PD".to_vec(), b"F-1".to_vec(), b".7".to_vec()]);
    }

    #[tokio::test]
    async fn from_path_reads_metadata_and_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(file.size(), 13);
        assert!(file.is_pdf(), "magic bytes should mark it as a PDF");
        let mut reader = file.open().await.unwrap();
        assert_eq!(reader.next_chunk(64).await.unwrap().unwrap(), b"%PDF-1.7 body");
        assert_eq!(reader.next_chunk(64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn disk_content_is_read_in_bounded_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        let mut reader = file.open().await.unwrap();
        assert_eq!(reader.len(), 10_000);

        let mut read = Vec::new();
        while let Some(chunk) = reader.next_chunk(4096).await.unwrap() {
            assert!(chunk.len() <= 4096);
            read.extend_from_slice(&chunk);
        }
        assert_eq!(read, content);
    }

    #[tokio::test]
    async fn open_after_the_file_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let file = SelectedFile::from_path(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = file.open().await.unwrap_err();
        assert!(matches!(err, FoliatorError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = SelectedFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, FoliatorError::FileNotFound { .. }));
    }
}
