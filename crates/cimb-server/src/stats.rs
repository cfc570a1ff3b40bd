use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-server request counters.
///
/// Built once by the server and shared through the router state; nothing here
/// is global.
#[derive(Debug, Default)]
pub struct RequestStats {
    requests: AtomicU64,
    authenticated: AtomicU64,
    challenges: AtomicU64,
    denied: AtomicU64,
    decode_failures: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// Point-in-time copy of [`RequestStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub authenticated: u64,
    pub challenges: u64,
    pub denied: u64,
    pub decode_failures: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, body_len: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(body_len as u64, Ordering::Relaxed);
    }

    pub fn record_authenticated(&self) {
        self.authenticated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge(&self) {
        self.challenges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, body_len: usize) {
        self.bytes_out.fetch_add(body_len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            authenticated: self.authenticated.load(Ordering::Relaxed),
            challenges: self.challenges.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_accumulate() {
        let stats = RequestStats::new();
        stats.record_request(100);
        stats.record_request(50);
        stats.record_challenge();
        stats.record_authenticated();
        stats.record_response(70);

        let snap = stats.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.bytes_in, 150);
        assert_eq!(snap.challenges, 1);
        assert_eq!(snap.authenticated, 1);
        assert_eq!(snap.bytes_out, 70);
        assert_eq!(snap.denied, 0);
    }

    #[tokio::test]
    async fn shared_across_tasks() {
        let stats = Arc::new(RequestStats::new());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        stats.record_request(1);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(stats.snapshot().requests, 800);
    }
}
