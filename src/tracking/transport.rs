//! Delivery transports for the first-party collector
//!
//! `BeaconQueue` is the unload-surviving path: payloads are handed to a
//! background worker over a bounded channel and the caller returns at once.
//! The worker owns the HTTP client and keeps sending after the click handler
//! (and whatever spawned it) is gone. `HttpKeepalive` is the fallback: a
//! single detached request per event.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{TrackingError, TrackingResult};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Fire-and-forget transmission. Returns whether the payload was accepted
/// for background delivery; never waits for the network.
pub trait BeaconTransport: Send + Sync {
    fn send_beacon(&self, endpoint: &Url, body: String) -> bool;
}

/// Request-based fallback. The dispatcher runs it on a detached task.
#[async_trait]
pub trait KeepaliveTransport: Send + Sync {
    async fn post_json(&self, endpoint: Url, body: String) -> TrackingResult<()>;
}

/// Shared POST used by both transports
async fn post(client: &Client, endpoint: Url, body: String) -> TrackingResult<()> {
    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(body)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TrackingError::CollectorStatus(status));
    }
    Ok(())
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("clicktrail/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to build configured HTTP client, using defaults");
            Client::new()
        })
}

struct Beacon {
    endpoint: Url,
    body: String,
}

/// Worker that drains queued beacons. Each beacon is sent on its own task so
/// a slow collector does not hold up the rest of the queue.
struct BeaconWorker {
    receiver: mpsc::Receiver<Beacon>,
    client: Client,
}

impl BeaconWorker {
    async fn run(mut self) {
        let mut in_flight = JoinSet::new();
        while let Some(beacon) = self.receiver.recv().await {
            let client = self.client.clone();
            in_flight.spawn(async move {
                let endpoint = beacon.endpoint.to_string();
                if let Err(err) = post(&client, beacon.endpoint, beacon.body).await {
                    warn!(endpoint = %endpoint, error = %err, "beacon delivery failed");
                } else {
                    debug!(endpoint = %endpoint, "beacon delivered");
                }
            });
            // Reap finished sends so the set does not grow without bound
            while in_flight.try_join_next().is_some() {}
        }

        info!(pending = in_flight.len(), "beacon queue closed, draining in-flight sends");
        while in_flight.join_next().await.is_some() {}
    }
}

/// Background beacon queue backed by a bounded channel
pub struct BeaconQueue {
    sender: Mutex<Option<mpsc::Sender<Beacon>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BeaconQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(capacity: usize, request_timeout: Duration) -> Self {
        Self::with_client(capacity, build_client(request_timeout))
    }

    pub fn with_client(capacity: usize, client: Client) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = BeaconWorker { receiver, client };
        let handle = tokio::spawn(worker.run());
        info!(capacity, "beacon queue started");

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Stop accepting beacons and wait until every queued one has been sent
    /// (or has failed).
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "beacon worker ended abnormally");
            }
        }
    }
}

impl BeaconTransport for BeaconQueue {
    fn send_beacon(&self, endpoint: &Url, body: String) -> bool {
        let Ok(guard) = self.sender.lock() else {
            return false;
        };
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        let beacon = Beacon {
            endpoint: endpoint.clone(),
            body,
        };
        match sender.try_send(beacon) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("beacon queue full, refusing payload");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// One POST per event, run on a detached task by the dispatcher
#[derive(Clone)]
pub struct HttpKeepalive {
    client: Client,
}

impl HttpKeepalive {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: build_client(request_timeout),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeepaliveTransport for HttpKeepalive {
    async fn post_json(&self, endpoint: Url, body: String) -> TrackingResult<()> {
        post(&self.client, endpoint, body).await
    }
}
