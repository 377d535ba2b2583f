//! Transport: how the pump opens an event stream.
//!
//! The pump only needs a buffered byte stream and a way to close it. The
//! HTTP client is one implementation; tests and demos plug in in-memory
//! transports.

use super::ChatCompletionRequest;
use crate::error::Result;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::io::{self, BufRead, Read};
use std::thread;

/// Bytes requested from the inner reader per read.
const CHUNK_SIZE: usize = 8 * 1024;

/// A buffered byte stream that can be moved to the pump thread.
pub type ByteStream = Box<dyn BufRead + Send>;

/// Close capability of an open stream. Invoked at most once.
pub type Closer = Box<dyn FnOnce() + Send>;

/// An opened event stream: its bytes and its close capability.
pub struct OpenStream {
    /// The event stream bytes.
    pub reader: ByteStream,
    /// Releases the stream; unblocks or fails subsequent reads.
    pub closer: Closer,
}

impl OpenStream {
    /// Wrap a blocking reader so that closing unblocks a pending read.
    ///
    /// The inner reader runs on its own `inkflow-read` thread and hands
    /// chunks over a channel. Once the closer runs, or is dropped, reads
    /// fail with [`io::ErrorKind::ConnectionAborted`] at once, even while
    /// the inner reader is still blocked. The read thread drops the inner
    /// reader when its current read returns.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the read thread.
    pub fn interruptible<R: Read + Send + 'static>(reader: R) -> Self {
        let (chunk_tx, chunk_rx) = bounded(1);
        let (close_tx, close_rx) = bounded::<()>(0);

        thread::Builder::new()
            .name("inkflow-read".to_string())
            .spawn(move || read_chunks(reader, &chunk_tx))
            .expect("Failed to spawn read thread");

        Self {
            reader: Box::new(io::BufReader::new(Interruptible {
                chunks: chunk_rx,
                closed: close_rx,
                pending: Vec::new(),
                pos: 0,
            })),
            closer: Box::new(move || drop(close_tx)),
        }
    }
}

impl std::fmt::Debug for OpenStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStream").finish_non_exhaustive()
    }
}

/// Opens completion event streams for the pump.
pub trait Transport: Sync {
    /// Send `request` and return its event stream.
    ///
    /// `request.stream` is already set.
    fn open(&self, request: &ChatCompletionRequest) -> Result<OpenStream>;
}

/// Read loop of the `inkflow-read` thread.
///
/// End of stream is signalled by dropping `chunks`.
fn read_chunks<R: Read>(mut reader: R, chunks: &Sender<io::Result<Vec<u8>>>) {
    loop {
        let mut buf = vec![0; CHUNK_SIZE];
        match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                buf.truncate(n);
                if chunks.send(Ok(buf)).is_err() {
                    tracing::trace!("stream closed, read thread exiting");
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = chunks.send(Err(e));
                return;
            }
        }
    }
}

/// Reader side of an interruptible stream.
///
/// `closed` never carries a message; it disconnects when the closer runs.
struct Interruptible {
    chunks: Receiver<io::Result<Vec<u8>>>,
    closed: Receiver<()>,
    pending: Vec<u8>,
    pos: usize,
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "read on closed stream")
}

impl Read for Interruptible {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if matches!(self.closed.try_recv(), Err(TryRecvError::Disconnected)) {
            return Err(aborted());
        }

        if self.pos == self.pending.len() {
            select! {
                recv(self.chunks) -> chunk => match chunk {
                    Ok(Ok(bytes)) => {
                        self.pending = bytes;
                        self.pos = 0;
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Ok(0),
                },
                recv(self.closed) -> _ => return Err(aborted()),
            }
        }

        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn test_interruptible_reads_until_closed() {
        let OpenStream { mut reader, closer } =
            OpenStream::interruptible(Cursor::new(b"one\ntwo\n".to_vec()));

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "one\n");

        closer();

        // "two" is already buffered; the next fill sees the stream closed.
        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "two\n");
        line.clear();
        let err = reader.read_line(&mut line).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    /// Blocks for `delay` before every read.
    struct Sluggish {
        delay: Duration,
    }

    impl Read for Sluggish {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.delay);
            buf[0] = b'x';
            Ok(1)
        }
    }

    #[test]
    fn test_close_unblocks_pending_read() {
        let OpenStream { mut reader, closer } = OpenStream::interruptible(Sluggish {
            delay: Duration::from_secs(3),
        });

        let start = Instant::now();
        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(50));
                closer();
            });
            let err = reader.fill_buf().unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        });
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_inner_error_and_eof_pass_through() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::TimedOut, "stalled"))
            }
        }

        let OpenStream { mut reader, closer: _closer } = OpenStream::interruptible(Failing);
        assert_eq!(reader.fill_buf().unwrap_err().kind(), io::ErrorKind::TimedOut);

        let OpenStream { mut reader, closer: _closer } =
            OpenStream::interruptible(Cursor::new(Vec::new()));
        let mut out = String::new();
        assert_eq!(reader.read_to_string(&mut out).unwrap(), 0);
    }
}
