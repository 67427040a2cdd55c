//! Concurrent probe dispatch, timeout enforcement and result aggregation

use crate::probe::models::{ErrorKind, ProbeReport, ProbeRequest, ProbeResult, ProxyDescriptor};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

/// Batch prober: one HTTP GET through each proxy of a request.
///
/// The prober itself never fails; every anticipated network or protocol
/// problem ends up as an [`ErrorKind`] on the per-proxy result.
#[derive(Debug, Clone, Default)]
pub struct Prober {
    cancel: Option<watch::Receiver<bool>>,
}

impl Prober {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prober that abandons outstanding work when the watched flag
    /// flips to `true`. Attempts not yet started resolve as `Cancelled`
    /// immediately; in-flight attempts are dropped and recorded the same way.
    pub fn with_cancel(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// Probe every descriptor of the request concurrently.
    ///
    /// Returns exactly one result per descriptor, ordered like the input
    /// regardless of completion order. An empty descriptor list yields an
    /// empty report immediately.
    pub async fn probe(&self, request: &ProbeRequest) -> ProbeReport {
        let started_at = Utc::now();

        if request.descriptors.is_empty() {
            return ProbeReport {
                results: Vec::new(),
                started_at,
                completed_at: Utc::now(),
            };
        }

        let concurrency = request.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut indexed: Vec<(usize, ProbeResult)> =
            stream::iter(request.descriptors.iter().cloned().enumerate())
                .map(|(index, descriptor)| {
                    let semaphore = Arc::clone(&semaphore);
                    async move {
                        // Acquire only fails if the semaphore is closed, which
                        // cannot happen while we hold the Arc.
                        let _permit = semaphore
                            .acquire()
                            .await
                            .expect("semaphore closed unexpectedly");
                        let result = self.probe_one(request, descriptor).await;
                        (index, result)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        indexed.sort_by_key(|(index, _)| *index);

        ProbeReport {
            results: indexed.into_iter().map(|(_, result)| result).collect(),
            started_at,
            completed_at: Utc::now(),
        }
    }

    async fn probe_one(&self, request: &ProbeRequest, descriptor: ProxyDescriptor) -> ProbeResult {
        if let Err(reason) = descriptor.validate() {
            warn!(proxy = %descriptor.to_simple_string(), %reason, "invalid descriptor");
            return ProbeResult::invalid(descriptor, reason);
        }

        match self.cancel.clone() {
            Some(mut cancel) => {
                if *cancel.borrow() {
                    return ProbeResult::cancelled(descriptor);
                }
                tokio::select! {
                    result = Self::attempt(request, &descriptor) => result,
                    _ = cancelled(&mut cancel) => {
                        debug!(proxy = %descriptor.to_simple_string(), "attempt cancelled");
                        ProbeResult::cancelled(descriptor.clone())
                    }
                }
            }
            None => Self::attempt(request, &descriptor).await,
        }
    }

    /// One connect+request+response cycle, bounded by the request timeout.
    async fn attempt(request: &ProbeRequest, descriptor: &ProxyDescriptor) -> ProbeResult {
        let client = match Self::build_client(request, descriptor) {
            Ok(client) => client,
            Err(err) => {
                // The descriptor already passed validation, so a client that
                // cannot be built means the protocol has no dial path.
                warn!(proxy = %descriptor.to_simple_string(), error = %err, "client setup failed");
                return ProbeResult::failure(
                    descriptor.clone(),
                    ErrorKind::Protocol,
                    err.to_string(),
                );
            }
        };

        debug!(proxy = %descriptor.url(), url = %request.target_url, "probing");
        let start = Instant::now();

        match tokio::time::timeout(request.timeout, client.get(&request.target_url).send()).await {
            Ok(Ok(response)) => {
                let latency = start.elapsed();
                let status = response.status();
                if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
                    // 407 comes from the proxy itself, not the target.
                    warn!(proxy = %descriptor.to_simple_string(), "proxy rejected credentials");
                    ProbeResult::failure(
                        descriptor.clone(),
                        ErrorKind::AuthFailed,
                        format!("proxy returned {}", status),
                    )
                } else {
                    debug!(
                        proxy = %descriptor.to_simple_string(),
                        status = status.as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "probe succeeded"
                    );
                    ProbeResult::success(descriptor.clone(), status.as_u16(), latency)
                }
            }
            Ok(Err(err)) => {
                let (kind, detail) = classify_error(&err);
                warn!(proxy = %descriptor.to_simple_string(), %kind, detail = %detail, "probe failed");
                ProbeResult::failure(descriptor.clone(), kind, detail)
            }
            Err(_) => {
                warn!(
                    proxy = %descriptor.to_simple_string(),
                    timeout_ms = request.timeout.as_millis() as u64,
                    "probe timed out"
                );
                ProbeResult::timeout(descriptor.clone(), request.timeout)
            }
        }
    }

    /// Build a client routed through the descriptor. The proxy scheme comes
    /// from the descriptor protocol; `Proxy::all` routes every target through
    /// the proxy, so https targets tunnel via CONNECT instead of bypassing it.
    fn build_client(
        request: &ProbeRequest,
        descriptor: &ProxyDescriptor,
    ) -> reqwest::Result<Client> {
        let proxy = ReqwestProxy::all(&descriptor.url())?;

        Client::builder()
            .proxy(proxy)
            .timeout(request.timeout)
            .build()
    }
}

/// Resolve once the cancellation flag flips to `true`. If the sender is gone
/// without cancelling, stay pending so the attempt runs to completion.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Map a transport failure onto the most specific error category, keeping the
/// full source chain as detail.
fn classify_error(err: &reqwest::Error) -> (ErrorKind, String) {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }

    let lower = detail.to_lowercase();

    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if lower.contains("dns") || lower.contains("failed to lookup") {
        ErrorKind::Dns
    } else if lower.contains("auth") || lower.contains("password") {
        ErrorKind::AuthFailed
    } else if lower.contains("certificate")
        || lower.contains("tls")
        || lower.contains("ssl")
        || lower.contains("handshake")
    {
        ErrorKind::Tls
    } else if err.is_connect() || lower.contains("connection refused") {
        ErrorKind::ConnectionRefused
    } else {
        ErrorKind::Protocol
    };

    (kind, detail)
}
