//! Delivering chunks to a remote HTTP endpoint.
//!
//! Every chunk goes out as its own POST and all requests are in flight at
//! once. A failure is recorded against the chunk that caused it; the other
//! chunks are still delivered and reported.

use crate::chunk::serialize_chunks;
use crate::dataset::Dataset;
use crate::error::Result;
use futures_util::future::join_all;
use log::{debug, info, warn};
use reqwest::{Client, header};

/// What happened to one chunk.
#[derive(Debug)]
pub struct ChunkDelivery {
    /// 0-based chunk index.
    pub index: usize,
    /// Response body on a 2xx reply.
    pub outcome: std::result::Result<String, reqwest::Error>,
}

impl ChunkDelivery {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-chunk results in chunk-index order.
#[derive(Debug)]
pub struct DispatchReport {
    pub deliveries: Vec<ChunkDelivery>,
}

impl DispatchReport {
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn all_ok(&self) -> bool {
        self.deliveries.iter().all(ChunkDelivery::is_ok)
    }
}

/// POST each chunk to `url` concurrently and wait for every response.
pub async fn send_chunks(client: &Client, url: &str, chunks: &[String]) -> DispatchReport {
    info!("sending {} chunks to {}", chunks.len(), url);

    let requests = chunks.iter().enumerate().map(|(index, chunk)| async move {
        let outcome = deliver(client, url, chunk).await;
        match &outcome {
            Ok(_) => debug!("chunk {} delivered to {}", index + 1, url),
            Err(e) => warn!("chunk {} to {} failed: {}", index + 1, url, e),
        }
        ChunkDelivery { index, outcome }
    });

    // join_all keeps input order
    let deliveries = join_all(requests).await;
    let report = DispatchReport { deliveries };
    info!(
        "dispatch to {} finished: {} ok, {} failed",
        url,
        report.succeeded(),
        report.failed()
    );
    report
}

async fn deliver(client: &Client, url: &str, chunk: &str) -> reqwest::Result<String> {
    client
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(chunk.to_owned())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Serialize `dataset` into `chunk_count` chunks in memory and send them.
///
/// Nothing is written to disk. Partitioning errors (an empty dataset, a zero
/// count) are returned before any request is made.
pub async fn split_and_send(
    client: &Client,
    dataset: &Dataset,
    url: &str,
    chunk_count: usize,
) -> Result<DispatchReport> {
    let chunks = serialize_chunks(dataset, chunk_count)?;
    Ok(send_chunks(client, url, &chunks).await)
}
