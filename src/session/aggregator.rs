// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Chunk aggregation for in-progress streamed messages
//!
//! One buffer per live exchange, keyed by an opaque [`StreamHandle`].
//! Fragments are concatenated exactly as received; every `append` returns
//! the full running text so the caller can publish an incremental
//! snapshot. Using a handle the aggregator does not know about is a logic
//! error (it means a cancellation race upstream) and fails fast.

use std::collections::HashMap;

use crate::error::{RedshellError, Result};

/// Token for one in-flight streamed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    /// Raw id, for diagnostics
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Accumulates stream fragments into one growing string per handle
#[derive(Debug, Default)]
pub struct ChunkAggregator {
    next_id: u64,
    buffers: HashMap<u64, String>,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh, empty buffer and return its handle
    pub fn begin(&mut self) -> StreamHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, String::new());
        StreamHandle(id)
    }

    /// Append a fragment and return the full accumulated text
    pub fn append(&mut self, handle: &StreamHandle, fragment: &str) -> Result<String> {
        let buffer = self
            .buffers
            .get_mut(&handle.0)
            .ok_or(RedshellError::UnknownStreamHandle(handle.0))?;
        buffer.push_str(fragment);
        Ok(buffer.clone())
    }

    /// Close the buffer and return the final text
    pub fn end(&mut self, handle: StreamHandle) -> Result<String> {
        self.buffers
            .remove(&handle.0)
            .ok_or(RedshellError::UnknownStreamHandle(handle.0))
    }

    /// Number of live buffers
    pub fn live_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_returns_distinct_handles() {
        let mut agg = ChunkAggregator::new();
        let a = agg.begin();
        let b = agg.begin();
        assert_ne!(a, b);
        assert_eq!(agg.live_count(), 2);
    }

    #[test]
    fn test_append_returns_running_concatenation() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();

        assert_eq!(agg.append(&h, "PORT ").unwrap(), "PORT ");
        assert_eq!(agg.append(&h, "STATE\n").unwrap(), "PORT STATE\n");
        assert_eq!(agg.append(&h, "80 open").unwrap(), "PORT STATE\n80 open");
    }

    #[test]
    fn test_append_preserves_bytes_exactly() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();
        let fragments = ["a", "", "b\r\n", "全角", "\u{1F600}"];

        let mut expected = String::new();
        for f in &fragments {
            expected.push_str(f);
            assert_eq!(agg.append(&h, f).unwrap(), expected);
        }
        assert_eq!(agg.end(h).unwrap(), expected);
    }

    #[test]
    fn test_end_returns_final_text() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();
        agg.append(&h, "hello ").unwrap();
        agg.append(&h, "world").unwrap();

        assert_eq!(agg.end(h).unwrap(), "hello world");
        assert_eq!(agg.live_count(), 0);
    }

    #[test]
    fn test_end_of_empty_buffer() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();
        assert_eq!(agg.end(h).unwrap(), "");
    }

    #[test]
    fn test_append_after_end_fails_fast() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();
        agg.end(h).unwrap();

        let err = agg.append(&h, "late").unwrap_err();
        assert!(matches!(err, RedshellError::UnknownStreamHandle(_)));
    }

    #[test]
    fn test_double_end_fails_fast() {
        let mut agg = ChunkAggregator::new();
        let h = agg.begin();
        agg.end(h).unwrap();
        assert!(agg.end(h).is_err());
    }

    #[test]
    fn test_independent_buffers() {
        let mut agg = ChunkAggregator::new();
        let a = agg.begin();
        let b = agg.begin();

        agg.append(&a, "session A").unwrap();
        agg.append(&b, "session B").unwrap();

        assert_eq!(agg.end(a).unwrap(), "session A");
        assert_eq!(agg.end(b).unwrap(), "session B");
    }
}
