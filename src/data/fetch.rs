//! Download input tables that are not present locally

use crate::config::DataSource;
use crate::error::{LoadError, LoadResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Make sure `source.path` exists, downloading it from `source.url` if needed
pub fn ensure_local(source: &DataSource) -> LoadResult<PathBuf> {
    if source.path.exists() {
        log::debug!("Using local file {}", source.path.display());
        return Ok(source.path.clone());
    }

    let url = match &source.url {
        Some(url) => url,
        None => return Err(LoadError::NotFound(source.path.clone())),
    };

    log::info!("Downloading {} to {}", url, source.path.display());
    let bytes = download(url)?;

    if let Some(parent) = source.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    write_atomically(&source.path, &bytes)?;

    log::info!("Fetched {} bytes", bytes.len());
    Ok(source.path.clone())
}

/// Write through a `.partial` sibling, removing it if either step fails
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let partial = path.with_extension("partial");
    let written = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, path));
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn download(url: &str) -> LoadResult<Vec<u8>> {
    let retrieval = |source| LoadError::Retrieval {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(retrieval)?;

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(retrieval)?;

    let bytes = response.bytes().map_err(retrieval)?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single HTTP response on a local port and return a URL for it
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/table.csv", addr)
    }

    #[test]
    fn missing_file_is_downloaded_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("table.csv");
        let source = DataSource::new(&path, Some(serve_once("200 OK", "a,b\n")));

        assert_eq!(ensure_local(&source).unwrap(), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn error_status_is_a_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let source = DataSource::new(&path, Some(serve_once("404 Not Found", "missing")));

        assert!(matches!(ensure_local(&source), Err(LoadError::Retrieval { .. })));
        assert!(!path.exists());
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn unreachable_host_is_a_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::new(dir.path().join("table.csv"), Some("http://127.0.0.1:1/x".into()));
        assert!(matches!(ensure_local(&source), Err(LoadError::Retrieval { .. })));
    }

    #[test]
    fn failed_rename_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let target = dir.path().join("table");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomically(&target, b"a,b\n").is_err());
        assert!(!target.with_extension("partial").exists());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn existing_file_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(&path, "a,b\n").unwrap();

        let source = DataSource::new(&path, Some("http://invalid.invalid/table.csv".into()));
        assert_eq!(ensure_local(&source).unwrap(), path);
    }

    #[test]
    fn missing_file_without_url_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::new(dir.path().join("missing.csv"), None);
        assert!(matches!(ensure_local(&source), Err(LoadError::NotFound(_))));
    }
}
