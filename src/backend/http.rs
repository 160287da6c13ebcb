//! reqwest implementation of [`FoliationBackend`].
//!
//! Redirects are never followed: the server signals a rejected upload with a
//! 302, and the upload orchestrator has to see that status rather than the
//! page it points to.
//!
//! Both requests stream the file in fixed-size chunks through
//! [`reqwest::Body::wrap_stream`], so a large disk file is never held in
//! memory. The final upload reports each chunk to the progress callback as
//! the transport pulls it.

use super::{BackendResponse, FoliationBackend};
use crate::config::ClientConfig;
use crate::error::{FoliatorError, TransportError};
use crate::form::{ContentReader, PreviewRequest, SelectedFile, UploadRequest, FILE_FIELD};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use async_trait::async_trait;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, LOCATION};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Size of each upload chunk handed to the transport.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Talks to a running foliation server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    preview_url: String,
    submit_url: String,
    request_timeout_secs: u64,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, FoliatorError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| FoliatorError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            preview_url: config.preview_url(),
            submit_url: config.submit_url(),
            request_timeout_secs: config.request_timeout_secs,
        })
    }
}

#[async_trait]
impl FoliationBackend for HttpBackend {
    async fn preview(&self, request: &PreviewRequest) -> Result<BackendResponse, TransportError> {
        let reader = open(&request.file).await?;
        let total = reader.len();
        let body = progress_body(reader, Arc::new(NoopProgressCallback));
        let part = file_part(&request.file, Part::stream_with_length(body, total))?;

        let mut form = Form::new().part(FILE_FIELD, part);
        for (name, value) in request.fields() {
            form = form.text(name, value);
        }

        debug!("POST {} (preview #{})", self.preview_url, request.id);
        let response = self
            .client
            .post(&self.preview_url)
            .multipart(form)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.request_timeout_secs))?;

        read_response(response, self.request_timeout_secs).await
    }

    async fn stamp(
        &self,
        request: &UploadRequest,
        progress: ProgressCallback,
    ) -> Result<BackendResponse, TransportError> {
        let reader = open(&request.file).await?;
        let total = reader.len();

        let mut form = Form::new();
        for (name, value) in request.fields() {
            form = form.text(name.clone(), value.clone());
        }
        let body = progress_body(reader, Arc::clone(&progress));
        form = form.part(
            FILE_FIELD,
            file_part(&request.file, Part::stream_with_length(body, total))?,
        );

        info!(
            "POST {} ({}, {} bytes)",
            self.submit_url,
            request.file.name(),
            total
        );
        progress.on_upload_start(Some(total));

        let response = self
            .client
            .post(&self.submit_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, 0))?;

        progress.on_upload_complete(response.status().as_u16());
        read_response(response, 0).await
    }
}

async fn open(file: &SelectedFile) -> Result<ContentReader, TransportError> {
    file.open()
        .await
        .map_err(|e| TransportError::Other(e.to_string()))
}

fn file_part(file: &SelectedFile, part: Part) -> Result<Part, TransportError> {
    part.file_name(file.name().to_string())
        .mime_str(file.media_type())
        .map_err(|e| TransportError::Other(format!("invalid media type: {e}")))
}

/// Wrap `reader` in a streaming body that reports every chunk to `progress`.
fn progress_body(reader: ContentReader, progress: ProgressCallback) -> reqwest::Body {
    reqwest::Body::wrap_stream(progress_stream(reader, progress))
}

fn progress_stream(
    reader: ContentReader,
    progress: ProgressCallback,
) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let total = reader.len();
    futures::stream::unfold((reader, 0u64), move |(mut reader, sent)| {
        let progress = Arc::clone(&progress);
        async move {
            match reader.next_chunk(UPLOAD_CHUNK_BYTES).await {
                Ok(Some(chunk)) => {
                    let sent = sent + chunk.len() as u64;
                    progress.on_upload_progress(sent, Some(total));
                    Some((Ok(chunk), (reader, sent)))
                }
                Ok(None) => None,
                Err(e) => Some((Err(e), (reader, sent))),
            }
        }
    })
}

/// Collect status, headers and body. Redirect bodies are not read: nothing
/// downstream looks at them.
async fn read_response(
    response: reqwest::Response,
    timeout_secs: u64,
) -> Result<BackendResponse, TransportError> {
    let status = response.status();
    let content_disposition = header_string(&response, CONTENT_DISPOSITION);
    let location = header_string(&response, LOCATION);

    let body = if status.is_redirection() {
        Vec::new()
    } else {
        response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout_secs))?
            .to_vec()
    };

    debug!("HTTP {} ({} bytes)", status.as_u16(), body.len());
    Ok(BackendResponse {
        status: status.as_u16(),
        content_disposition,
        location,
        body,
    })
}

fn header_string(response: &reqwest::Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn map_reqwest_error(e: reqwest::Error, timeout_secs: u64) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { secs: timeout_secs }
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        TransportError::Body(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampSettings;
    use crate::form::snapshot;
    use crate::machine::upload::filename_from_disposition;
    use crate::progress::UploadProgressCallback;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<(u64, Option<u64>)>>,
        complete: Mutex<Option<u16>>,
    }

    impl UploadProgressCallback for Recorder {
        fn on_upload_progress(&self, loaded: u64, total: Option<u64>) {
            self.progress.lock().unwrap().push((loaded, total));
        }

        fn on_upload_complete(&self, status: u16) {
            *self.complete.lock().unwrap() = Some(status);
        }
    }

    /// Accept one connection, read the whole request, answer with `response`
    /// and hand the raw request back.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 8192];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (origin, handle)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(head_end) = find(request, b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
        let body = &request[head_end + 4..];
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        match length {
            Some(len) => body.len() >= len,
            None if head.contains("transfer-encoding: chunked") => {
                find(body, b"\r\n0\r\n\r\n").is_some()
            }
            None => true,
        }
    }

    fn backend_for(origin: &str) -> HttpBackend {
        let config = ClientConfig::builder()
            .base_url(origin)
            .request_timeout_secs(5)
            .build()
            .unwrap();
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn backend_builds_from_default_config() {
        let backend = HttpBackend::new(&ClientConfig::default()).unwrap();
        assert_eq!(backend.preview_url, "http://localhost:5000/preview");
        assert_eq!(backend.submit_url, "http://localhost:5000/");
    }

    #[tokio::test]
    async fn disk_upload_streams_in_chunks_and_reports_each() {
        use futures::StreamExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        let content: Vec<u8> = (0..UPLOAD_CHUNK_BYTES * 2 + 10)
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &content).unwrap();
        let file = SelectedFile::from_path(&path).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let reader = file.open().await.unwrap();
        let mut stream = Box::pin(progress_stream(reader, recorder.clone()));
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= UPLOAD_CHUNK_BYTES);
            received.extend_from_slice(&chunk);
        }

        assert_eq!(received, content);
        let events = recorder.progress.lock().unwrap().clone();
        let total = Some(content.len() as u64);
        assert_eq!(
            events,
            vec![
                (UPLOAD_CHUNK_BYTES as u64, total),
                (UPLOAD_CHUNK_BYTES as u64 * 2, total),
                (content.len() as u64, total),
            ]
        );
    }

    #[tokio::test]
    async fn preview_posts_suffixed_fields_and_reads_the_image() {
        let (origin, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\n\
             Connection: close\r\n\r\nPNG!",
        )
        .await;
        let controls = StampSettings::default().to_controls();
        let request = PreviewRequest {
            id: 1,
            file: SelectedFile::from_bytes("a.pdf", b"%PDF-1.7 preview".to_vec()),
            snapshot: snapshot(&controls),
        };

        let response = backend_for(&origin).preview(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"PNG!");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /preview "), "{raw}");
        assert!(raw.contains(r#"name="pdf_file"; filename="a.pdf""#));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("%PDF-1.7 preview"));
        assert!(raw.contains(r#"name="start_number_prev""#));
        assert!(raw.contains(r#"name="corner_prev""#));
        assert!(!raw.contains(r#"name="start_number""#));
    }

    #[tokio::test]
    async fn stamp_redirect_is_not_followed() {
        let (origin, server) = serve_once(
            "HTTP/1.1 302 FOUND\r\nLocation: /\r\nContent-Length: 5\r\n\
             Connection: close\r\n\r\nnope!",
        )
        .await;
        let file = SelectedFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec());
        let request = UploadRequest::from_form(file, &StampSettings::default().to_controls());

        let recorder = Arc::new(Recorder::default());
        let response = backend_for(&origin)
            .stamp(&request, recorder.clone())
            .await
            .unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.location.as_deref(), Some("/"));
        assert!(response.body.is_empty());
        assert_eq!(*recorder.complete.lock().unwrap(), Some(302));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST / "), "{raw}");
        assert!(raw.contains(r#"name="start_number""#));
        assert!(!raw.contains("_prev\""));
    }

    #[tokio::test]
    async fn stamp_streams_a_disk_file_and_returns_the_attachment() {
        let (origin, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\n\
             Content-Disposition: attachment; filename=\"foliado_123.pdf\"\r\n\
             Content-Length: 12\r\nConnection: close\r\n\r\n%PDF-stamped",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.7 from disk").unwrap();
        let file = SelectedFile::from_path(&path).await.unwrap();
        let request = UploadRequest::from_form(file, &StampSettings::default().to_controls());

        let recorder = Arc::new(Recorder::default());
        let response = backend_for(&origin)
            .stamp(&request, recorder.clone())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"%PDF-stamped");
        assert_eq!(
            filename_from_disposition(response.content_disposition.as_deref()),
            "foliado_123.pdf"
        );
        assert_eq!(
            recorder.progress.lock().unwrap().last().copied(),
            Some((18, Some(18)))
        );

        let raw = server.await.unwrap();
        assert!(raw.contains(r#"name="pdf_file"; filename="scan.pdf""#));
        assert!(raw.contains("%PDF-1.7 from disk"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .connect_timeout_secs(1)
            .build()
            .unwrap();
        let backend = HttpBackend::new(&config).unwrap();
        let request = PreviewRequest {
            id: 1,
            file: SelectedFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec()),
            snapshot: Default::default(),
        };
        assert!(backend.preview(&request).await.is_err());
    }
}
