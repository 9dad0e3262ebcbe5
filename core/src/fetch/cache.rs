//! Session-lifetime memoization of resource loads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use hashbrown::HashMap;
use tracing::{debug, warn};

use super::codec::Codec;
use super::source::ResourceSource;
use crate::error::{Error, Result};

type LoadFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

struct Entry<T> {
    /// Distinguishes a failed load from a newer retry under the same key
    generation: u64,
    load: LoadFuture<T>,
}

/// Fetch + decompress + decode, at most once per key.
///
/// The first caller for a key starts the load and stores the pending result;
/// every later caller, concurrent or not, awaits that same result. A failed
/// load is evicted so the next request starts over, and the failure is
/// delivered to every caller that was waiting on it. Successful entries are
/// kept for the life of the cache.
pub struct ResourceCache<T> {
    source: Arc<dyn ResourceSource>,
    entries: Mutex<HashMap<String, Entry<T>>>,
    next_generation: AtomicU64,
}

impl<T: Send + Sync + 'static> ResourceCache<T> {
    pub fn new(source: Arc<dyn ResourceSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `key`, decoding the decompressed text with `decode` on a blocking
    /// thread. `decode` only runs for the caller that starts the load.
    pub async fn get_or_load<F>(&self, key: &str, decode: F) -> Result<Arc<T>>
    where
        F: FnOnce(&str, &str) -> Result<T> + Send + 'static,
    {
        let (generation, load) = {
            let mut entries = self.entries();
            match entries.get(key) {
                Some(entry) => {
                    debug!(key = %key, "Resource cache hit");
                    (entry.generation, entry.load.clone())
                }
                None => {
                    debug!(key = %key, "Resource cache miss, starting load");
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let load = start_load(Arc::clone(&self.source), key.to_string(), decode);
                    entries.insert(
                        key.to_string(),
                        Entry {
                            generation,
                            load: load.clone(),
                        },
                    );
                    (generation, load)
                }
            }
        };

        let result = load.await;
        if let Err(e) = &result {
            self.evict_failed(key, generation, e);
        }
        result
    }

    fn evict_failed(&self, key: &str, generation: u64, error: &Error) {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|e| e.generation == generation) {
            entries.remove(key);
            warn!(key = %key, error = %error, "Resource load failed, entry evicted");
        }
    }

    /// Whether `key` has a pending or completed load.
    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop `key` so the next request reloads it. Callers already awaiting
    /// the old load still receive its result.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

fn start_load<T, F>(source: Arc<dyn ResourceSource>, key: String, decode: F) -> LoadFuture<T>
where
    T: Send + Sync + 'static,
    F: FnOnce(&str, &str) -> Result<T> + Send + 'static,
{
    async move {
        let bytes = source.fetch(&key).await?;
        let task_key = key.clone();
        let value = tokio::task::spawn_blocking(move || {
            let text = Codec::for_key(&task_key).decode(&task_key, &bytes)?;
            decode(&task_key, &text)
        })
        .await
        .map_err(|e| Error::fetch(&key, format!("load task failed: {e}")))??;
        debug!(key = %key, "Resource loaded");
        Ok(Arc::new(value))
    }
    .boxed()
    .shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Serves fixed bytes after a short delay, counting fetches. The first
    /// `failures` fetches fail.
    struct CountingSource {
        body: Vec<u8>,
        fetches: AtomicUsize,
        failures: usize,
    }

    impl CountingSource {
        fn new(body: &[u8], failures: usize) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_vec(),
                fetches: AtomicUsize::new(0),
                failures,
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResourceSource for CountingSource {
        async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if n < self.failures {
                return Err(Error::fetch(key, "connection reset"));
            }
            Ok(self.body.clone())
        }
    }

    fn decode_text(_key: &str, text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let source = CountingSource::new(b"payload", 0);
        let cache = ResourceCache::<String>::new(source.clone());

        let (a, b, c, d) = tokio::join!(
            cache.get_or_load("k", decode_text),
            cache.get_or_load("k", decode_text),
            cache.get_or_load("k", decode_text),
            cache.get_or_load("k", decode_text),
        );
        for result in [a, b, c, d] {
            assert_eq!(result.unwrap().as_str(), "payload");
        }
        assert_eq!(source.fetches(), 1);

        // Later callers are served from the completed entry
        cache.get_or_load("k", decode_text).await.unwrap();
        assert_eq!(source.fetches(), 1);
        assert!(cache.contains("k"));
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let source = CountingSource::new(b"payload", 0);
        let cache = ResourceCache::<String>::new(source.clone());

        let (a, b) = tokio::join!(
            cache.get_or_load("a", decode_text),
            cache.get_or_load("b", decode_text),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_then_retries() {
        let source = CountingSource::new(b"payload", 1);
        let cache = ResourceCache::<String>::new(source.clone());

        let (a, b, c) = tokio::join!(
            cache.get_or_load("k", decode_text),
            cache.get_or_load("k", decode_text),
            cache.get_or_load("k", decode_text),
        );
        for result in [a, b, c] {
            assert!(matches!(result, Err(Error::Fetch { .. })));
        }
        assert_eq!(source.fetches(), 1);
        assert!(!cache.contains("k"));

        // Not poisoned: the next call retries from scratch
        let value = cache.get_or_load("k", decode_text).await.unwrap();
        assert_eq!(value.as_str(), "payload");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_evicted() {
        let source = CountingSource::new(b"payload", 0);
        let cache = ResourceCache::<String>::new(source.clone());

        let err = cache
            .get_or_load("k", |key, _| Err(Error::parse(key, "bad row")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_gzip_resources_are_decompressed() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"1\t5\t3\t10\t0\n").unwrap();
        let source = CountingSource::new(&encoder.finish().unwrap(), 0);
        let cache = ResourceCache::new(source);

        let records = cache
            .get_or_load("map/1.tsv.gz", crate::records::parse_rows)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].weight, 10.0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let source = CountingSource::new(b"payload", 0);
        let cache = ResourceCache::<String>::new(source.clone());

        cache.get_or_load("k", decode_text).await.unwrap();
        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        cache.get_or_load("k", decode_text).await.unwrap();
        assert_eq!(source.fetches(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
