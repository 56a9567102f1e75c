use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Request and connection counters shared by every worker and the reporter.
#[derive(Debug, Default)]
pub struct Counter {
    requests_this_interval: AtomicU64,
    total_requests: AtomicU64,
    active_connections: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self, n: u32) {
        let n = u64::from(n);
        self.requests_this_interval.fetch_add(n, Ordering::AcqRel);
        self.total_requests.fetch_add(n, Ordering::Relaxed);
    }

    /// Hands back everything counted since the previous call and starts a new interval.
    pub fn get_and_reset_requests(&self) -> u64 {
        self.requests_this_interval.swap(0, Ordering::AcqRel)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bumps the live connection gauge; it drops back when the guard does.
    pub fn connection_opened(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counter: self.clone(),
        }
    }
}

pub struct ConnectionGuard {
    counter: SharedCounter,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}

pub type SharedCounter = Arc<Counter>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn increments_feed_interval_and_total() {
        let counter = Counter::new();
        counter.increment_requests(10);
        counter.increment_requests(5);

        assert_eq!(counter.get_and_reset_requests(), 15);
        assert_eq!(counter.get_and_reset_requests(), 0);
        assert_eq!(counter.total_requests(), 15);

        counter.increment_requests(3);
        assert_eq!(counter.get_and_reset_requests(), 3);
        assert_eq!(counter.total_requests(), 18);
    }

    #[test]
    fn concurrent_increments_and_resets_lose_nothing() {
        let counter = Arc::new(Counter::new());
        let done = Arc::new(AtomicBool::new(false));

        let reporter = {
            let counter = counter.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut seen = 0u64;
                while !done.load(Ordering::Acquire) {
                    seen += counter.get_and_reset_requests();
                }
                seen + counter.get_and_reset_requests()
            })
        };

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for i in 0..10_000u32 {
                        counter.increment_requests(i % 7 + 1);
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        let seen = reporter.join().unwrap();

        let expected: u64 = 8 * (0..10_000u64).map(|i| i % 7 + 1).sum::<u64>();
        assert_eq!(seen, expected);
        assert_eq!(counter.total_requests(), expected);
    }

    #[tokio::test]
    async fn concurrent_tasks_share_one_counter() {
        let counter = Arc::new(Counter::new());
        let tasks = (0..50).map(|_| {
            let counter = counter.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    counter.increment_requests(2);
                    tokio::task::yield_now().await;
                }
            })
        });

        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(counter.get_and_reset_requests(), 10_000);
        assert_eq!(counter.total_requests(), 10_000);
    }

    #[test]
    fn guards_pair_open_and_close() {
        let counter = Arc::new(Counter::new());
        let first = counter.connection_opened();
        let second = counter.connection_opened();
        assert_eq!(counter.active_connections(), 2);

        drop(first);
        assert_eq!(counter.active_connections(), 1);
        drop(second);
        assert_eq!(counter.active_connections(), 0);
    }

    #[test]
    fn gauge_never_negative_across_threads() {
        let counter = Arc::new(Counter::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let guard = counter.connection_opened();
                        assert!(counter.active_connections() >= 1);
                        drop(guard);
                        assert!(counter.active_connections() >= 0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.active_connections(), 0);
    }
}
