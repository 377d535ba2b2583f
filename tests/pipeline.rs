//! End-to-end pipeline tests over an in-memory transport.

use inkflow::{
    stream_markdown, CancelToken, ChatCompletionRequest, ErrorKind, Message, OpenStream,
    StreamError, StreamOptions, Transport, UiTarget,
};
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn record(text: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n",
        serde_json::to_string(text).unwrap()
    )
}

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("test-model", vec![Message::user("hello")])
}

fn disabled() -> StreamOptions {
    StreamOptions {
        ui: UiTarget::Disabled,
        ..StreamOptions::default()
    }
}

/// Serves a fixed body and records what it was asked for.
struct Canned {
    body: String,
    opened: AtomicUsize,
    streamed: Mutex<Option<bool>>,
}

impl Canned {
    fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            opened: AtomicUsize::new(0),
            streamed: Mutex::new(None),
        }
    }
}

impl Transport for Canned {
    fn open(&self, request: &ChatCompletionRequest) -> inkflow::Result<OpenStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.streamed.lock().unwrap() = Some(request.stream);
        Ok(OpenStream::interruptible(io::Cursor::new(
            self.body.clone().into_bytes(),
        )))
    }
}

/// Refuses every request.
struct Refusing;

impl Transport for Refusing {
    fn open(&self, _: &ChatCompletionRequest) -> inkflow::Result<OpenStream> {
        Err(StreamError::Api {
            status: 401,
            body: "invalid api key".into(),
        })
    }
}

/// Sends one record, then stalls until closed.
struct Stalling {
    closes: Arc<AtomicUsize>,
}

struct StallingReader {
    first: Option<Vec<u8>>,
    closed: Arc<AtomicUsize>,
}

impl Read for StallingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(first) = self.first.take() {
            let n = first.len().min(buf.len());
            buf[..n].copy_from_slice(&first[..n]);
            return Ok(n);
        }
        while self.closed.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(2));
        }
        Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed"))
    }
}

impl Transport for Stalling {
    fn open(&self, _: &ChatCompletionRequest) -> inkflow::Result<OpenStream> {
        let closes = Arc::clone(&self.closes);
        let reader = StallingReader {
            first: Some(record("partial").into_bytes()),
            closed: Arc::clone(&self.closes),
        };
        Ok(OpenStream {
            reader: Box::new(io::BufReader::new(reader)),
            closer: Box::new(move || {
                closes.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }
}

/// Sends one record, then blocks in `read` far longer than any test runs.
struct Blocking;

struct BlockingReader {
    first: Option<Vec<u8>>,
}

impl Read for BlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(first) = self.first.take() {
            let n = first.len().min(buf.len());
            buf[..n].copy_from_slice(&first[..n]);
            return Ok(n);
        }
        std::thread::sleep(Duration::from_secs(3));
        Ok(0)
    }
}

impl Transport for Blocking {
    fn open(&self, _: &ChatCompletionRequest) -> inkflow::Result<OpenStream> {
        Ok(OpenStream::interruptible(BlockingReader {
            first: Some(record("partial").into_bytes()),
        }))
    }
}

#[test]
fn test_hi_there_renders_once() {
    let body = format!("{}{}data: [DONE]\n", record("Hi"), record(" there"));
    let transport = Canned::new(body);
    let mut sink = Vec::new();

    let transcript =
        stream_markdown(&transport, &CancelToken::new(), &request(), &mut sink, disabled())
            .unwrap();

    assert_eq!(transcript.raw, "Hi there");
    let out = String::from_utf8(sink).unwrap();
    assert_eq!(inkflow::terminal::ansi::strip(&out), "Hi there\n");
    assert_eq!(*transport.streamed.lock().unwrap(), Some(true));
    assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
}

#[test]
fn test_decode_error_surfaces() {
    let transport = Canned::new("data: not-json\n");
    let mut sink = Vec::new();

    let failure =
        stream_markdown(&transport, &CancelToken::new(), &request(), &mut sink, disabled())
            .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Decode);
    assert!(failure.to_string().contains("not-json"));
    assert!(sink.is_empty());
}

#[test]
fn test_decode_error_after_content_keeps_partial() {
    let body = format!("{}data: not-json\n", record("Hello"));
    let transport = Canned::new(body);
    let mut sink = Vec::new();

    let failure =
        stream_markdown(&transport, &CancelToken::new(), &request(), &mut sink, disabled())
            .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Decode);
    assert_eq!(failure.partial.raw, "Hello");
}

#[test]
fn test_cancel_before_first_fragment_writes_nothing() {
    let transport = Canned::new(format!("{}data: [DONE]\n", record("never shown")));
    let scope = CancelToken::new();
    scope.cancel();
    let mut sink = Vec::new();

    let failure = stream_markdown(&transport, &scope, &request(), &mut sink, disabled()).unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Canceled);
    assert!(failure.error.is_canceled());
    assert!(sink.is_empty());
    assert_eq!(transport.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_raw_mode_writes_fragments_verbatim() {
    let body = format!("{}{}data: [DONE]\n", record("# Title"), record("\n*raw*"));
    let transport = Canned::new(body);
    let mut sink = Vec::new();
    let opts = StreamOptions {
        raw: true,
        ..disabled()
    };

    let transcript =
        stream_markdown(&transport, &CancelToken::new(), &request(), &mut sink, opts).unwrap();

    assert_eq!(sink, b"# Title\n*raw*");
    assert_eq!(transcript.rendered, "# Title\n*raw*");
}

#[test]
fn test_open_failure_is_transport_error() {
    let mut sink = Vec::new();
    let failure =
        stream_markdown(&Refusing, &CancelToken::new(), &request(), &mut sink, disabled())
            .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Transport);
    assert!(matches!(failure.error, StreamError::Api { status: 401, .. }));
    assert!(sink.is_empty());
}

#[test]
fn test_render_error_wins_over_pump_cancel() {
    let body = format!("{}data: [DONE]\n", record("boom"));
    let transport = Canned::new(body);
    let mut sink = Vec::new();
    let opts = StreamOptions {
        renderer: Some(Box::new(|_: &str| -> inkflow::Result<String> {
            Err(StreamError::Render("unsupported".into()))
        })),
        ..disabled()
    };

    let failure =
        stream_markdown(&transport, &CancelToken::new(), &request(), &mut sink, opts).unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Render);
    assert!(sink.is_empty());
}

#[test]
fn test_deadline_stops_stalled_stream_and_closes_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let transport = Stalling {
        closes: Arc::clone(&closes),
    };
    let scope = CancelToken::new().with_timeout(Duration::from_millis(50));
    let mut sink = Vec::new();

    let failure = stream_markdown(&transport, &scope, &request(), &mut sink, disabled()).unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Canceled);
    assert!(matches!(failure.error, StreamError::DeadlineExceeded));
    assert_eq!(failure.partial.raw, "partial");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(sink.is_empty());
}

#[test]
fn test_deadline_returns_while_read_is_blocked() {
    let scope = CancelToken::new().with_timeout(Duration::from_millis(100));
    let mut sink = Vec::new();

    let start = Instant::now();
    let failure = stream_markdown(&Blocking, &scope, &request(), &mut sink, disabled()).unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(failure.kind(), ErrorKind::Canceled);
    assert!(matches!(failure.error, StreamError::DeadlineExceeded));
    assert_eq!(failure.partial.raw, "partial");
    assert!(sink.is_empty());
}

#[test]
fn test_cancel_returns_while_read_is_blocked() {
    let scope = CancelToken::new();
    let canceler = scope.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceler.cancel();
    });
    let mut sink = Vec::new();

    let start = Instant::now();
    let failure = stream_markdown(&Blocking, &scope, &request(), &mut sink, disabled()).unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(matches!(failure.error, StreamError::Canceled));
    assert!(sink.is_empty());
}
