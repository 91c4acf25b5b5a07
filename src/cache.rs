//! In-memory compile cache keyed by content hash.
//!
//! Bundler plugins compile the same template many times across rebuilds; a
//! hit skips the whole pipeline. Keys cover both the source text and the
//! option fingerprint so a flag flip never serves stale output.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::ast::Template;
use crate::context::{compile, CompileOptionsInput, CompileResult};

#[derive(Default)]
pub struct CompileCache {
    entries: Mutex<HashMap<String, CompileResult>>,
}

impl CompileCache {
    pub fn new() -> Self {
        CompileCache::default()
    }

    pub fn compute_hash(source: &str, options: &CompileOptionsInput) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        if let Ok(fingerprint) = serde_json::to_string(options) {
            hasher.update(fingerprint.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, source: &str, options: &CompileOptionsInput) -> Option<CompileResult> {
        let key = Self::compute_hash(source, options);
        match self.entries.lock() {
            Ok(entries) => entries.get(&key).cloned(),
            Err(e) => {
                eprintln!("[FilamentNative] Cache lock poisoned: {}", e);
                None
            }
        }
    }

    pub fn set(&self, source: &str, options: &CompileOptionsInput, result: CompileResult) {
        let key = Self::compute_hash(source, options);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, result);
        }
    }

    /// Compiles through the cache; misses populate it.
    pub fn compile_cached(
        &self,
        source: &str,
        template: &Template,
        options: &CompileOptionsInput,
    ) -> CompileResult {
        if let Some(hit) = self.get(source, options) {
            return hit;
        }
        let result = compile(source, template, &options.to_options());
        self.set(source, options, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
