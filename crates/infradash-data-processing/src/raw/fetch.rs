use std::future::Future;

use crate::{DataError, source::BlobLocation};

use super::{BlobStore, FetchOptions, Result, RetryPolicy};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use tokio::runtime::Runtime;
use tracing::{info, instrument, warn};

/// Object store reachable over HTTP, e.g. `https://storage.googleapis.com`.
///
/// Objects are read from `<base_url>/<bucket>/<object>`.
#[derive(Debug)]
pub struct HttpObjectStore {
    base_url: String,
    client: Client,
    token: Option<String>,
    retry: RetryPolicy,
    runtime: Runtime,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, options: &FetchOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: options.token.clone(),
            retry: options.retry,
            runtime: Runtime::new()?,
        })
    }

    #[must_use]
    pub fn object_url(&self, location: &BlobLocation) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            location.bucket,
            location.object.trim_start_matches('/')
        )
    }
}

impl BlobStore for HttpObjectStore {
    #[instrument(name = "Download blob", skip(self), fields(location = %location), level = "info")]
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        self.runtime.block_on(download_with_retry(
            &self.client,
            &self.object_url(location),
            self.token.as_deref(),
            location,
            self.retry,
        ))
    }

    #[instrument(name = "Download blobs", skip_all, fields(count = locations.len()), level = "info")]
    fn fetch_many(&self, locations: &[BlobLocation]) -> Result<Vec<Bytes>> {
        self.runtime.block_on(async {
            let downloads = locations.iter().map(|location| {
                let url = self.object_url(location);
                async move {
                    download_with_retry(
                        &self.client,
                        &url,
                        self.token.as_deref(),
                        location,
                        self.retry,
                    )
                    .await
                }
            });
            futures::future::try_join_all(downloads).await
        })
    }
}

/// Whether a failure is worth another attempt.
fn is_transient(error: &DataError) -> bool {
    match error {
        DataError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        DataError::UnexpectedStatus { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}

async fn download_with_retry(
    client: &Client,
    url: &str,
    token: Option<&str>,
    location: &BlobLocation,
    retry: RetryPolicy,
) -> Result<Bytes> {
    retry_with_backoff(retry, location, move || {
        download_to_memory(client, url, token, location)
    })
    .await
}

/// Run `operation`, retrying [`is_transient`] failures with backoff until
/// `retry` runs out of attempts.
async fn retry_with_backoff<T, F, Fut>(
    retry: RetryPolicy,
    location: &BlobLocation,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let delay = retry.delay_after(attempt);
                warn!(%location, attempt, ?delay, error = %e, "Transient download failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

async fn download_to_memory(
    client: &Client,
    url: &str,
    token: Option<&str>,
    location: &BlobLocation,
) -> Result<Bytes> {
    info!(url, "Starting download");
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;

    let status = response.status();
    match status {
        StatusCode::NOT_FOUND => return Err(DataError::ObjectNotFound(location.clone())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(DataError::Unauthorized {
                location: location.clone(),
                status: status.as_u16(),
            });
        }
        s if !s.is_success() => {
            return Err(DataError::UnexpectedStatus {
                location: location.clone(),
                status: s.as_u16(),
            });
        }
        _ => {}
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(progress_style());
    pb.set_message(format!(
        "Downloading {}",
        location.object.split('/').next_back().unwrap_or(&location.object)
    ));

    let mut buffer = BytesMut::with_capacity(total_size as usize);
    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        buffer.extend_from_slice(&chunk);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    info!(url, bytes = buffer.len(), "Download complete");
    Ok(buffer.freeze())
}
