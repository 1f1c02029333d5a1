//! In-process TTL tracking (spec.md §4.8, §8 Non-goals).
//!
//! Expirations are never written to the ByteStore: this index lives only
//! in memory and is rebuilt empty on every `Operator::open`. A background
//! thread ticks on `OpenOptions::ttl_tick` and, for every key whose
//! deadline has passed, invokes the expiry callback supplied at
//! construction time — which the Operator wires up to its normal delete
//! path, so an expired key disappears exactly as if a caller had deleted it.

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

type ExpiryCallback = dyn Fn(&[u8]) + Send + Sync;

struct Inner {
    /// Ordered by `(expire_at, key)` so the smallest deadline is always first.
    by_deadline: Mutex<BTreeSet<(i64, Vec<u8>)>>,
    /// Reverse index so `set_ttl`/`remove_ttl` can find a key's current
    /// deadline without scanning `by_deadline`.
    by_key: Mutex<HashMap<Vec<u8>, i64>>,
}

pub struct TtlManager {
    inner: Arc<Inner>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl TtlManager {
    /// `now_fn` supplies the current time (epoch millis) so tests can use a
    /// deterministic clock; the Operator passes in a wall-clock source.
    pub fn start(
        tick: Duration,
        now_fn: impl Fn() -> i64 + Send + Sync + 'static,
        on_expire: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Self {
        let inner = Arc::new(Inner {
            by_deadline: Mutex::new(BTreeSet::new()),
            by_key: Mutex::new(HashMap::new()),
        });
        let (tx, rx) = mpsc::channel::<()>();
        let worker_inner = Arc::clone(&inner);
        let on_expire: Arc<ExpiryCallback> = Arc::new(on_expire);
        let worker = std::thread::spawn(move || loop {
            match rx.recv_timeout(tick) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    Self::sweep(&worker_inner, now_fn(), &on_expire);
                }
            }
        });
        TtlManager {
            inner,
            shutdown_tx: Some(tx),
            worker: Some(worker),
        }
    }

    fn sweep(inner: &Inner, now: i64, on_expire: &ExpiryCallback) {
        let expired: Vec<(i64, Vec<u8>)> = {
            let deadlines = inner.by_deadline.lock().unwrap_or_else(|p| p.into_inner());
            deadlines
                .iter()
                .take_while(|(expire_at, _)| *expire_at <= now)
                .cloned()
                .collect()
        };
        if expired.is_empty() {
            return;
        }
        // Lock order is always by_key then by_deadline (matches set_ttl/
        // remove_ttl) so the sweep thread can never deadlock against a
        // concurrent caller taking the opposite order.
        let mut by_key = inner.by_key.lock().unwrap_or_else(|p| p.into_inner());
        let mut deadlines = inner.by_deadline.lock().unwrap_or_else(|p| p.into_inner());
        for (expire_at, key) in &expired {
            deadlines.remove(&(*expire_at, key.clone()));
            if by_key.get(key) == Some(expire_at) {
                by_key.remove(key);
            }
        }
        drop(deadlines);
        drop(by_key);
        for (_, key) in &expired {
            on_expire(key);
        }
    }

    /// Installs or replaces the expiry deadline for `key`.
    pub fn set_ttl(&self, key: &[u8], expire_at: i64) {
        let mut by_key = self.inner.by_key.lock().unwrap_or_else(|p| p.into_inner());
        let mut deadlines = self.inner.by_deadline.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = by_key.insert(key.to_vec(), expire_at) {
            deadlines.remove(&(old, key.to_vec()));
        }
        deadlines.insert((expire_at, key.to_vec()));
    }

    /// Removes any TTL tracked for `key`, if one is set.
    pub fn remove_ttl(&self, key: &[u8]) {
        let mut by_key = self.inner.by_key.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = by_key.remove(key) {
            let mut deadlines = self.inner.by_deadline.lock().unwrap_or_else(|p| p.into_inner());
            deadlines.remove(&(old, key.to_vec()));
        }
    }

    /// The deadline currently tracked for `key`, if any.
    pub fn ttl_of(&self, key: &[u8]) -> Option<i64> {
        self.inner.by_key.lock().unwrap_or_else(|p| p.into_inner()).get(key).copied()
    }
}

impl Drop for TtlManager {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;

    #[test]
    fn set_and_query_ttl() {
        let mgr = TtlManager::start(Duration::from_secs(3600), || 0, |_| {});
        mgr.set_ttl(b"a", 100);
        assert_eq!(mgr.ttl_of(b"a"), Some(100));
        mgr.set_ttl(b"a", 200);
        assert_eq!(mgr.ttl_of(b"a"), Some(200));
        mgr.remove_ttl(b"a");
        assert_eq!(mgr.ttl_of(b"a"), None);
    }

    #[test]
    fn sweep_fires_expiry_callback_for_due_keys() {
        let clock = Arc::new(AtomicI64::new(0));
        let clock_for_fn = Arc::clone(&clock);
        let expired: Arc<StdMutex<Vec<Vec<u8>>>> = Arc::new(StdMutex::new(Vec::new()));
        let expired_for_cb = Arc::clone(&expired);

        let inner = Arc::new(Inner {
            by_deadline: Mutex::new(BTreeSet::new()),
            by_key: Mutex::new(HashMap::new()),
        });
        inner.by_deadline.lock().unwrap().insert((10, b"a".to_vec()));
        inner.by_key.lock().unwrap().insert(b"a".to_vec(), 10);
        inner.by_deadline.lock().unwrap().insert((1000, b"b".to_vec()));
        inner.by_key.lock().unwrap().insert(b"b".to_vec(), 1000);

        clock_for_fn.store(50, Ordering::SeqCst);
        TtlManager::sweep(&inner, clock.load(Ordering::SeqCst), &move |key: &[u8]| {
            expired_for_cb.lock().unwrap().push(key.to_vec());
        });

        assert_eq!(expired.lock().unwrap().as_slice(), &[b"a".to_vec()]);
        assert_eq!(inner.by_key.lock().unwrap().get(b"a".as_slice()), None);
        assert_eq!(inner.by_key.lock().unwrap().get(b"b".as_slice()), Some(&1000));
    }
}
