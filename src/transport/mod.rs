//! Push transport for live stream events.

mod sse;

pub use sse::SseTransport;
