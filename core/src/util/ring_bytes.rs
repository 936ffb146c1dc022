use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bounded capture buffer shared between a stream pump and its owner.
///
/// Keeps the most recent `cap` bytes and counts what was dropped, so the
/// owner can snapshot partial output at any time, including after the
/// producing process was killed.
pub struct RingBytes {
    inner: Mutex<Inner>,
    cap: usize,
}

struct Inner {
    buf: VecDeque<u8>,
    dropped: u64,
}

impl RingBytes {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(cap.min(64 * 1024)),
                dropped: 0,
            }),
            cap,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, data: &[u8]) {
        let mut g = self.lock();
        let (skipped, data) = if data.len() > self.cap {
            (data.len() - self.cap, &data[data.len() - self.cap..])
        } else {
            (0, data)
        };
        let overflow = g.buf.len().saturating_add(data.len()).saturating_sub(self.cap);
        if overflow > 0 {
            g.buf.drain(..overflow);
        }
        g.dropped += (skipped + overflow) as u64;
        g.buf.extend(data);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let g = self.lock();
        let mut vec = Vec::with_capacity(g.buf.len());
        vec.extend(g.buf.iter().copied());
        vec
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Lossy UTF-8 snapshot, prefixed with a marker when the head was dropped.
    pub fn to_string_lossy(&self) -> String {
        let bytes = self.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        match self.dropped() {
            0 => text.into_owned(),
            n => format!("[... {n} bytes truncated]\n{text}"),
        }
    }
}
