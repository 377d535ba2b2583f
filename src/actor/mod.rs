//! Actor Model: Message-passing concurrency for the streaming pipeline.
//!
//! Every thread here only feeds channels; the render loop is the single
//! owner of all UI state:
//! - **Pump Actor**: Drains the fragment source, hands fragments off
//! - **Input Actor**: Polls terminal events, forwards to the render loop
//! - **Ticker Actors**: Drive the loader animation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      Fragment       ┌──────────────┐
//! │ Pump Thread  │ ─────────────────▶  │              │
//! └──────────────┘                     │              │
//! ┌──────────────┐     InputEvent      │ Render Loop  │
//! │ Input Thread │ ─────────────────▶  │              │
//! └──────────────┘                     │              │
//! ┌──────────────┐        Tick         │              │
//! │   Tickers    │ ─────────────────▶  │              │
//! └──────────────┘                     └──────────────┘
//! ```

mod input;
mod messages;
mod pump;
mod ticker;

pub use input::InputActor;
pub use messages::{Event, InputEvent, KeyCode, KeyModifiers};
pub use pump::{PumpHandle, StreamPump};
pub use ticker::{Tick, TickerActor};
