//! Content-addressed decode cache.
//!
//! Entries are keyed by the SHA-256 of the raw text. Each entry is a
//! `OnceLock`, so concurrent callers asking for the same content block on a
//! single decode and then share its result. Failed decodes are cached too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::model::Document;
use crate::validate::ValidateOptions;

pub type Fingerprint = [u8; 32];

pub type Shared = Result<Arc<Document>, Arc<Error>>;

/// SHA-256 of the raw text.
pub fn fingerprint(text: &str) -> Fingerprint {
    Sha256::digest(text.as_bytes()).into()
}

#[derive(Debug, Default)]
pub struct DecodeCache {
    options: ValidateOptions,
    slots: Mutex<HashMap<Fingerprint, Arc<OnceLock<Shared>>>>,
}

impl DecodeCache {
    pub fn new(options: ValidateOptions) -> Self {
        Self {
            options,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Decode `text`, or return the result of an earlier decode of the same
    /// content.
    pub fn decode(&self, text: &str) -> Shared {
        let key = fingerprint(text);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };

        slot.get_or_init(|| {
            debug!(bytes = text.len(); "decode cache miss");
            super::decode_with(text, &self.options)
                .map(Arc::new)
                .map_err(Arc::new)
        })
        .clone()
    }

    /// Number of distinct contents seen.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const DOC: &str = r#"{"version": "3.0", "elements": {"D": ["drift", {"length": 1}]}, "lattices": {"L": ["D"]}}"#;

    #[test]
    fn same_content_shares_one_document() {
        let cache = DecodeCache::default();
        let a = cache.decode(DOC).unwrap();
        let b = cache.decode(&DOC.to_string()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_cached() {
        let cache = DecodeCache::default();
        let a = cache.decode("{").unwrap_err();
        let b = cache.decode("{").unwrap_err();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_callers_observe_one_decode() {
        let cache = Arc::new(DecodeCache::default());
        let docs: Vec<Arc<Document>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    s.spawn(move || cache.decode(DOC).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(docs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        assert_ne!(fingerprint("a"), fingerprint("b"));
        assert_eq!(fingerprint(DOC), fingerprint(DOC));
    }
}
