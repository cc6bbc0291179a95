//! Memoization of completed text and audio results
//!
//! Text entries are keyed by subject, task and a bounded prefix of the problem
//! text. Two problems that only differ after the first
//! [`TEXT_KEY_PREFIX_CHARS`] characters share an entry; this trades accuracy
//! for a small, predictable key. Audio entries are keyed by the full summary
//! text since summaries are short.

use crate::analysis::{ProblemInput, Subject, TaskKind};
use crate::audio::AudioPayload;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of problem-text characters that take part in a text key
pub const TEXT_KEY_PREFIX_CHARS: usize = 50;

/// Hex digits of the image hash kept in a text key
const IMAGE_FINGERPRINT_LEN: usize = 16;

/// Deterministic cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a task response: `subject|task|text prefix|image fingerprint`
    pub fn for_task(
        subject: Subject,
        task: TaskKind,
        input: &ProblemInput,
        prefix_chars: usize,
    ) -> Self {
        let prefix: String = input.text_or_empty().chars().take(prefix_chars).collect();
        let image = input
            .image
            .as_ref()
            .map(|img| image_fingerprint(&img.data_base64))
            .unwrap_or_else(|| "-".to_string());

        Self(format!("{}|{}|{}|{}", subject, task, prefix, image))
    }

    /// Key for synthesized speech of `text`
    pub fn for_audio(text: &str) -> Self {
        Self(format!("TTS|{text}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn image_fingerprint(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(IMAGE_FINGERPRINT_LEN);
    hex
}

/// Sizing of the response cache
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum entries per map; `None` keeps everything for the process lifetime
    pub max_entries: Option<usize>,

    /// Entries older than this read as absent
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Unbounded, never-expiring cache
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// LRU-bounded cache
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ttl: None,
        }
    }

    /// Set the time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// One LRU map with optional expiry
#[derive(Debug)]
struct ExpiringLru<V> {
    entries: LruCache<CacheKey, Entry<V>>,
    ttl: Option<Duration>,
}

impl<V: Clone> ExpiringLru<V> {
    fn new(config: &CacheConfig) -> Self {
        let entries = match config.max_entries.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            entries,
            ttl: config.ttl,
        }
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.inserted_at) >= ttl)
    }

    fn get(&mut self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.peek(key) {
            Some(entry) => self.is_expired(entry, now),
            None => return None,
        };

        if expired {
            self.entries.pop(key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: CacheKey, value: V) {
        self.entries.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn prune_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }
}

/// Text and audio response cache shared by clones
#[derive(Debug, Clone)]
pub struct ResponseCache {
    text: Arc<Mutex<ExpiringLru<String>>>,
    audio: Arc<Mutex<ExpiringLru<AudioPayload>>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            text: Arc::new(Mutex::new(ExpiringLru::new(&config))),
            audio: Arc::new(Mutex::new(ExpiringLru::new(&config))),
        }
    }

    pub fn get_text(&self, key: &CacheKey) -> Option<String> {
        let hit = self.text.lock().get(key);
        if hit.is_some() {
            debug!("Text cache hit: {}", key);
        }
        hit
    }

    pub fn put_text(&self, key: CacheKey, value: String) {
        self.text.lock().put(key, value);
    }

    pub fn get_audio(&self, key: &CacheKey) -> Option<AudioPayload> {
        let hit = self.audio.lock().get(key);
        if hit.is_some() {
            debug!("Audio cache hit");
        }
        hit
    }

    pub fn put_audio(&self, key: CacheKey, value: AudioPayload) {
        self.audio.lock().put(key, value);
    }

    /// Number of text entries
    pub fn text_len(&self) -> usize {
        self.text.lock().entries.len()
    }

    /// Number of audio entries
    pub fn audio_len(&self) -> usize {
        self.audio.lock().entries.len()
    }

    pub fn len(&self) -> usize {
        self.text_len() + self.audio_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries from both maps, returning how many were removed
    pub fn prune_expired(&self) -> usize {
        self.text.lock().prune_expired() + self.audio.lock().prune_expired()
    }

    pub fn clear(&self) {
        self.text.lock().entries.clear();
        self.audio.lock().entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
