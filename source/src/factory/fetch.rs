use std::io;

use futures::TryStreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncRead;
use tracing::{debug, warn};
use url::Url;

use crate::Error;

/// Opens a reader over the body of `url`. `file://` URLs are opened from
/// the local filesystem, everything else goes through `http_client`.
pub(super) async fn download(
    http_client: &reqwest::Client,
    url: &Url,
) -> Result<Box<dyn AsyncRead + Send + Unpin>, Error> {
    match url.scheme() {
        "file" => {
            // "Returns Err if the host is neither empty nor "localhost""
            let path = url.to_file_path().map_err(|_| {
                Error::Io(
                    redact_url(url).to_string(),
                    io::Error::new(io::ErrorKind::InvalidInput, "invalid host for file:// scheme"),
                )
            })?;

            let f = tokio::fs::File::open(&path)
                .await
                .map_err(|e| Error::io(redact_url(url), e))?;
            Ok(Box::new(f))
        }
        _ => {
            let resp = http_client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| Error::Io(redact_url(url).to_string(), io::Error::other(e.without_url())))?;

            match resp.status() {
                StatusCode::NOT_FOUND | StatusCode::GONE => {
                    return Err(Error::NotFound(redact_url(url).to_string()))
                }
                status if !status.is_success() => {
                    return Err(Error::Io(
                        redact_url(url).to_string(),
                        io::Error::other(format!("unexpected status {}", status)),
                    ))
                }
                status => debug!(%status, "fetching response body"),
            }

            Ok(Box::new(tokio_util::io::StreamReader::new(
                resp.bytes_stream().map_err(|e| {
                    let e = e.without_url();
                    warn!(%e, "failed to get response body");
                    io::Error::new(io::ErrorKind::BrokenPipe, e)
                }),
            )))
        }
    }
}

/// Replaces credentials in `url`, so it can be logged or put into errors.
pub(super) fn redact_url(url: &Url) -> Url {
    let mut url = url.to_owned();
    if !url.username().is_empty() {
        let _ = url.set_username("redacted");
    }

    if url.password().is_some() {
        let _ = url.set_password(Some("redacted"));
    }

    url
}
