//! Stream Markdown Demo: Streams a chat completion into the terminal.
//!
//! Reads `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`) from the
//! environment. Without a key, a canned response is streamed locally so
//! the loader and live viewport can be seen offline.
//!
//! Press Ctrl+C to interrupt. Up/Down, j/k, PageUp/PageDown, g/G scroll.

use clap::Parser;
use inkflow::{
    stream_markdown, CancelToken, ChatCompletionRequest, Client, ClientConfig, Message,
    OpenStream, StreamOptions, Transport,
};
use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

const SAMPLE_TEXT: &str = r#"# Streaming markdown

Inkflow shows a **loader** until the first token arrives, then re-renders
the whole response on every fragment:

1. The pump reads `data:` records on its own thread.
2. The render loop waits on one `select!` over fragments, ticks and keys.
3. When the stream ends the frame is erased and the final render printed.

```rust
let transcript = stream_markdown(&client, &scope, &request, &mut stdout, opts)?;
```

> Interrupt at any time with Ctrl+C.
"#;

#[derive(Parser)]
#[command(name = "stream_markdown")]
#[command(about = "Stream a chat completion as live markdown")]
struct Args {
    /// The prompt to send
    prompt: Option<String>,

    /// Model name
    #[arg(short, long, default_value = "gpt-4o-mini")]
    model: String,

    /// Print fragments as they arrive, without styling
    #[arg(long)]
    raw: bool,

    /// Word wrap column (0 for the default)
    #[arg(long, default_value_t = 0)]
    wrap: usize,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    log: Option<String>,
}

/// Replays a canned response word by word.
struct Replay;

struct SlowReader {
    records: Vec<Vec<u8>>,
    next: usize,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(record) = self.records.get(self.next) else {
            return Ok(0);
        };
        std::thread::sleep(Duration::from_millis(if self.next == 0 { 600 } else { 25 }));
        let n = record.len().min(buf.len());
        buf[..n].copy_from_slice(&record[..n]);
        if n == record.len() {
            self.next += 1;
        } else {
            self.records[self.next].drain(..n);
        }
        Ok(n)
    }
}

impl Transport for Replay {
    fn open(&self, _: &ChatCompletionRequest) -> inkflow::Result<OpenStream> {
        let mut records: Vec<Vec<u8>> = SAMPLE_TEXT
            .split_inclusive(' ')
            .map(|word| {
                let content = serde_json::to_string(word).unwrap_or_default();
                format!("data: {{\"choices\":[{{\"delta\":{{\"content\":{content}}}}}]}}\n\n")
                    .into_bytes()
            })
            .collect();
        records.push(b"data: [DONE]\n".to_vec());
        Ok(OpenStream::interruptible(SlowReader { records, next: 0 }))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = &args.log {
        if let Err(e) = inkflow::logging::init_file(path) {
            eprintln!("cannot open log file: {e}");
            return ExitCode::FAILURE;
        }
    }

    let prompt = args
        .prompt
        .unwrap_or_else(|| "Explain streaming markdown rendering briefly.".to_string());
    let request = ChatCompletionRequest::new(args.model, vec![Message::user(prompt)]);
    let opts = StreamOptions {
        raw: args.raw,
        word_wrap: args.wrap,
        on_interrupt: Some(Box::new(|| eprintln!("interrupted"))),
        ..StreamOptions::default()
    };

    let scope = CancelToken::new();
    let mut stdout = io::stdout();
    let result = match ClientConfig::from_env() {
        Some(config) => match Client::new(config) {
            Ok(client) => stream_markdown(&client, &scope, &request, &mut stdout, opts),
            Err(e) => {
                eprintln!("cannot build client: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => stream_markdown(&Replay, &scope, &request, &mut stdout, opts),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(failure) if failure.error.is_canceled() => ExitCode::from(130),
        Err(failure) => {
            eprintln!("error: {failure}");
            ExitCode::FAILURE
        }
    }
}
