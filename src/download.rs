//! Streaming file download with progress reporting
//!
//! The body is streamed into `<dest>.part` and renamed into place once the
//! last chunk is written. `dest` only ever holds a complete export.

use crate::util::human_bytes;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Errors from a download
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bad response from server: HTTP {0}")]
    Status(u16),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bytes written and time taken
#[derive(Debug, Clone, Copy)]
pub struct DownloadStats {
    pub bytes: u64,
    pub elapsed: Duration,
}

fn progress_bar(total: Option<u64>, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    };
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> DownloadError {
    let path = path.to_path_buf();
    move |source| DownloadError::Write { path, source }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream the response body into `file`, returning the bytes written
async fn write_body(
    response: reqwest::Response,
    mut file: tokio::fs::File,
    partial: &Path,
    pb: Option<&ProgressBar>,
) -> Result<u64, DownloadError> {
    let mut bytes: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(write_err(partial))?;
        bytes += chunk.len() as u64;
        if let Some(pb) = pb {
            pb.set_position(bytes);
        }
    }

    file.flush().await.map_err(write_err(partial))?;
    Ok(bytes)
}

/// Download `url` into `dest`, creating parent directories as needed
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    quiet: bool,
) -> Result<DownloadStats, DownloadError> {
    let start = Instant::now();
    info!("Downloading {} to {}", url, dest.display());

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status.as_u16()));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_err(parent))?;
    }

    let partial = part_path(dest);
    let file = tokio::fs::File::create(&partial)
        .await
        .map_err(write_err(&partial))?;

    let pb = progress_bar(response.content_length(), quiet);
    let written = write_body(response, file, &partial, pb.as_ref()).await;
    let bytes = match written {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Some(ref pb) = pb {
                pb.abandon();
            }
            // Never leave a truncated export behind
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(write_err(dest))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let stats = DownloadStats {
        bytes,
        elapsed: start.elapsed(),
    };
    info!(
        "Downloaded {} in {:.1}s",
        human_bytes(stats.bytes),
        stats.elapsed.as_secs_f64()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serve one canned HTTP response on a local port
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        serve_declaring(status_line, body, body.len()).await
    }

    /// Like `serve_once`, but announce `declared_len` bytes of body
    async fn serve_declaring(
        status_line: &'static str,
        body: &'static [u8],
        declared_len: usize,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line, declared_len
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/export.xml", addr)
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("database/organizations.xml")),
            PathBuf::from("database/organizations.xml.part")
        );
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let body: &'static [u8] = b"<ListOfIRPublicDetail></ListOfIRPublicDetail>";
        let url = serve_once("200 OK", body).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("organizations.xml");

        let stats = download_file(&client(), &url, &dest, true)
            .await
            .unwrap();

        assert_eq!(stats.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_error_status_leaves_nothing_behind() {
        let url = serve_once("404 Not Found", b"missing").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("organizations.xml");

        let err = download_file(&client(), &url, &dest, true)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Status(404)));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        let url = serve_declaring("200 OK", b"<ListOfIRPublicDetail>", 4096).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("organizations.xml");

        let err = download_file(&client(), &url, &dest, true)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Http(_)));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }
}
