//! Single-shot reachability probes.
//!
//! A probe is one GET against the next URL in a round-robin rotation, with a
//! timestamp query parameter so intermediate caches cannot answer for an
//! unreachable origin. Only an exact 200 counts as online; every transport
//! failure — timeout, DNS, refused connection, cancellation — normalizes to
//! `false` and is never surfaced as an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Wraparound bound for the request counter. The counter only indexes the
/// URL rotation; the bound exists to keep it from growing without limit and
/// carries no other meaning.
const MAX_REQUEST_INDEX: u64 = 24 * 60 * 60 * 1000;

pub struct Prober {
    client: reqwest::Client,
    request_counter: AtomicU64,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder().build().unwrap_or_default(),
            request_counter: AtomicU64::new(0),
        }
    }

    /// Perform exactly one probe. Resolves `true` iff the selected URL
    /// answered HTTP 200 within `timeout`.
    pub async fn probe_once(&self, urls: &[String], timeout: Duration) -> bool {
        if urls.is_empty() {
            return false;
        }
        let index = self.advance_counter() as usize % urls.len();
        let url = &urls[index];
        let cache_bust = chrono::Utc::now().timestamp_millis().to_string();

        match self
            .client
            .get(url)
            .query(&[("cache_bust", cache_bust.as_str())])
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => {
                let online = response.status() == reqwest::StatusCode::OK;
                trace!(url = %url, status = %response.status(), online, "probe completed");
                online
            }
            Err(err) => {
                debug!(url = %url, err = %err, "probe failed");
                false
            }
        }
    }

    /// Forget the rotation position, so the next cycle starts fresh.
    pub fn reset(&self) {
        self.request_counter.store(0, Ordering::SeqCst);
    }

    /// Increment the counter, wrapping past [`MAX_REQUEST_INDEX`], and return
    /// the new value.
    fn advance_counter(&self) -> u64 {
        let previous = self
            .request_counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n >= MAX_REQUEST_INDEX { 1 } else { n + 1 })
            })
            .unwrap_or(0);
        if previous >= MAX_REQUEST_INDEX {
            1
        } else {
            previous + 1
        }
    }
}
