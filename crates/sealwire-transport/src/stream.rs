// ============================================
// File: crates/sealwire-transport/src/stream.rs
// ============================================
//! # Byte Streams
//!
//! ## Creation Reason
//! The engine consumes and produces plain byte buffers. `ByteStream` is
//! the ordered, reliable pipe a driver moves them over.
//!
//! ## Main Functionality
//! - `ByteStream`: async read / write_all / shutdown
//! - `MemoryPipe`: in-memory duplex pair for tests and in-process peers
//! - `IoStream`: adapter for any tokio `AsyncRead + AsyncWrite`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `read` returning `0` means end of stream, never "try again"
//! - `MemoryPipe` buffers are bounded; a writer that outpaces its reader
//!   waits until the reader drains, and gets `Closed` once the reading end
//!   is dropped
//!
//! ## Last Modified
//! v0.1.0 - Initial stream abstractions

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

use crate::error::{Result, TransportError};

// ============================================
// Constants
// ============================================

/// Maximum bytes buffered in one direction of a `MemoryPipe`.
pub const MAX_PIPE_BUFFER: usize = 1 << 20;

// ============================================
// ByteStream Trait
// ============================================

/// Ordered, reliable byte pipe.
///
/// # Example
/// ```
/// use sealwire_transport::stream::{ByteStream, MemoryPipe};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut a, mut b) = MemoryPipe::pair();
/// a.write_all(b"hello").await?;
///
/// let mut buf = [0u8; 16];
/// let n = b.read(&mut buf).await?;
/// assert_eq!(&buf[..n], b"hello");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ByteStream: Send {
    /// Reads available bytes into `buf`, waiting for at least one.
    /// Returns `0` at end of stream.
    ///
    /// # Errors
    /// Returns error if the underlying read fails.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `data`.
    ///
    /// # Errors
    /// `Closed` if the write side was shut down, or an I/O error.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Closes the write side. The peer reads end of stream once buffered
    /// bytes are drained.
    ///
    /// # Errors
    /// Returns error if shutdown fails.
    async fn shutdown(&mut self) -> Result<()>;
}

// ============================================
// MemoryPipe
// ============================================

/// One direction of a `MemoryPipe`.
#[derive(Debug, Default)]
struct Channel {
    buffer: Mutex<VecDeque<u8>>,
    /// Writer shut down or dropped.
    closed: AtomicBool,
    /// Reader dropped.
    reader_gone: AtomicBool,
    readable: Notify,
    writable: Notify,
}

impl Channel {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.readable.notify_one();
    }

    fn drop_reader(&self) {
        self.reader_gone.store(true, Ordering::Release);
        self.writable.notify_one();
    }
}

/// One end of an in-memory duplex byte pipe.
///
/// # Features
/// - No sockets or system resources
/// - Counts bytes written for verification
/// - Writers wait for space once `MAX_PIPE_BUFFER` bytes are queued
/// - Dropping an end closes both of its directions
pub struct MemoryPipe {
    inbound: Arc<Channel>,
    outbound: Arc<Channel>,
    bytes_written: AtomicU64,
}

impl MemoryPipe {
    /// Creates two connected ends.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Channel::default());
        let b_to_a = Arc::new(Channel::default());
        let a = Self {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            bytes_written: AtomicU64::new(0),
        };
        let b = Self {
            inbound: a_to_b,
            outbound: b_to_a,
            bytes_written: AtomicU64::new(0),
        };
        (a, b)
    }

    /// Total bytes written by this end.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Bytes waiting to be read by this end.
    #[must_use]
    pub fn pending_read(&self) -> usize {
        self.inbound.buffer.lock().len()
    }
}

#[async_trait]
impl ByteStream for MemoryPipe {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let read = {
                let mut queue = self.inbound.buffer.lock();
                let len = queue.len().min(buf.len());
                for (slot, byte) in buf.iter_mut().zip(queue.drain(..len)) {
                    *slot = byte;
                }
                len
            };
            if read > 0 {
                self.inbound.writable.notify_one();
                return Ok(read);
            }
            if self.inbound.closed.load(Ordering::Acquire) && self.inbound.buffer.lock().is_empty() {
                return Ok(0);
            }

            // Wait for the peer to write or close
            self.inbound.readable.notified().await;
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            if self.outbound.closed.load(Ordering::Acquire) || self.outbound.reader_gone.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            let written = {
                let mut queue = self.outbound.buffer.lock();
                let len = MAX_PIPE_BUFFER.saturating_sub(queue.len()).min(rest.len());
                queue.extend(&rest[..len]);
                len
            };
            if written == 0 {
                // Full: wait for the reader to drain
                self.outbound.writable.notified().await;
                continue;
            }
            rest = &rest[written..];
            self.bytes_written.fetch_add(written as u64, Ordering::Relaxed);
            self.outbound.readable.notify_one();
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.outbound.close();
        Ok(())
    }
}

impl Drop for MemoryPipe {
    fn drop(&mut self) {
        self.outbound.close();
        self.inbound.drop_reader();
    }
}

impl std::fmt::Debug for MemoryPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPipe")
            .field("pending_read", &self.pending_read())
            .field("bytes_written", &self.bytes_written())
            .field("write_closed", &self.outbound.closed.load(Ordering::Acquire))
            .finish()
    }
}

// ============================================
// IoStream
// ============================================

/// `ByteStream` over any tokio stream (`TcpStream`, `DuplexStream`, ...).
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
}

impl<T> IoStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Borrows the wrapped stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T> ByteStream for IoStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner
            .read(buf)
            .await
            .map_err(|e| TransportError::io("stream read", e))
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner
            .write_all(data)
            .await
            .map_err(|e| TransportError::io("stream write", e))?;
        self.inner
            .flush()
            .await
            .map_err(|e| TransportError::io("stream flush", e))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| TransportError::io("stream shutdown", e))
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_both_directions() {
        let (mut a, mut b) = MemoryPipe::pair();
        a.write_all(b"ping").await.unwrap();
        b.write_all(b"pong").await.unwrap();

        let mut buf = [0u8; 8];
        let n = b.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        let n = a.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
        assert_eq!(a.bytes_written(), 4);
    }

    #[tokio::test]
    async fn test_partial_reads() {
        let (mut a, mut b) = MemoryPipe::pair();
        a.write_all(b"abcdef").await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(b.pending_read(), 2);
        assert_eq!(b.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[tokio::test]
    async fn test_read_waits_for_writer() {
        let (mut a, mut b) = MemoryPipe::pair();
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let n = b.read(&mut buf).await.unwrap();
            buf[..n].to_vec()
        });
        tokio::task::yield_now().await;
        a.write_all(b"late").await.unwrap();
        assert_eq!(reader.await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_eof() {
        let (mut a, mut b) = MemoryPipe::pair();
        a.write_all(b"last").await.unwrap();
        a.shutdown().await.unwrap();
        assert!(matches!(a.write_all(b"more").await, Err(TransportError::Closed)));

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).await.unwrap(), 4);
        assert_eq!(b.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_closes() {
        let (a, mut b) = MemoryPipe::pair();
        drop(a);
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_pipe_waits_for_reader() {
        let (mut a, mut b) = MemoryPipe::pair();
        let total = MAX_PIPE_BUFFER * 2 + 17;
        let writer = tokio::spawn(async move {
            a.write_all(&vec![0xAB; total]).await.unwrap();
            a.bytes_written()
        });

        let mut received = 0;
        let mut buf = vec![0u8; 64 * 1024];
        while received < total {
            let n = b.read(&mut buf).await.unwrap();
            assert!(buf[..n].iter().all(|&byte| byte == 0xAB));
            received += n;
        }
        assert_eq!(writer.await.unwrap(), total as u64);
        assert_eq!(b.pending_read(), 0);
    }

    #[tokio::test]
    async fn test_blocked_writer_fails_when_reader_dropped() {
        let (mut a, b) = MemoryPipe::pair();
        let writer = tokio::spawn(async move { a.write_all(&vec![0u8; MAX_PIPE_BUFFER + 1]).await });
        tokio::task::yield_now().await;
        drop(b);
        assert!(matches!(writer.await.unwrap(), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_io_stream_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut left = IoStream::new(left);
        let mut right = IoStream::new(right);

        left.write_all(b"over tokio").await.unwrap();
        let mut buf = [0u8; 32];
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"over tokio");

        left.shutdown().await.unwrap();
        assert_eq!(right.read(&mut buf).await.unwrap(), 0);
    }
}
