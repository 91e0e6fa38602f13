//! Parley - streaming multi-agent conversation client
//!
//! Subscribes to a conversation server's event stream, reconciles background
//! tasks by polling, and renders the conversation in the terminal.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::events::{BusError, EventOp, EventReceiver};
use parley::{
    ComponentKind, ConversationStore, EventBus, HttpTaskSource, RendererRegistry, Settings,
    SseTransport, StreamEvent, StreamingMarkdown, TaskPoller,
};

/// Parley - follow a multi-agent conversation from your terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the conversation server
    #[arg(short, long, env = "PARLEY_SERVER")]
    server: Option<String>,

    /// Conversation to follow (a new id is generated when omitted)
    #[arg(short, long)]
    conversation: Option<String>,

    /// Seconds between task reconciliation fetches
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Determine log level from args or env
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }

    let mut settings = Settings::load();
    if let Some(server) = args.server {
        settings.server_url = server;
    }
    if let Some(secs) = args.poll_interval {
        settings.poll_interval_secs = secs;
    }

    let conversation_id = args
        .conversation
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(conversation = %conversation_id, server = %settings.server_url, "starting");

    let bus = EventBus::new();
    let store = Arc::new(ConversationStore::new());
    store.set_current(&conversation_id);
    let registry = RendererRegistry::new();

    let stream_url = format!(
        "{}/conversations/{}/events",
        settings.server_url.trim_end_matches('/'),
        conversation_id
    );
    let transport = SseTransport::new(stream_url, bus.sender())
        .with_retry_delay(settings.retry_delay());
    let transport_task = tokio::spawn(async move { transport.run().await });

    let poller = TaskPoller::with_interval(
        Arc::new(HttpTaskSource::new(&settings.server_url)),
        bus.sender(),
        settings.poll_interval(),
    );
    poller.watch(&conversation_id);

    let receiver = bus.subscribe();
    let result = event_loop(receiver, &store, &registry, &conversation_id).await;

    poller.stop();
    transport_task.abort();
    result
}

/// Drain the bus into the store and paint what changed, until ctrl-c.
async fn event_loop(
    mut receiver: EventReceiver,
    store: &ConversationStore,
    registry: &RendererRegistry,
    conversation_id: &str,
) -> anyhow::Result<()> {
    let mut painter = Painter::new(registry);
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; shutting down");
                return Ok(());
            }
            event = receiver.recv() => {
                match event {
                    Ok(event) => {
                        store.dispatch(&event);
                        if event.conversation_id == conversation_id {
                            painter.paint(&event, store, &mut stdout)?;
                        }
                    }
                    Err(BusError::Lagged(n)) => {
                        tracing::warn!("display fell behind by {n} events");
                    }
                    Err(BusError::Closed) => {
                        tracing::info!("event bus closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Incremental display.
///
/// Markdown text streams through a line-buffered markdown renderer as it
/// arrives, so headers, bullets, and code blocks get styled live; one text
/// stream is active at a time and flushes when another item takes over.
/// Everything else renders in full through the registry once the item
/// finishes.
struct Painter<'a> {
    registry: &'a RendererRegistry,
    stream: StreamingMarkdown,
    streaming_item: Option<String>,
}

impl<'a> Painter<'a> {
    fn new(registry: &'a RendererRegistry) -> Self {
        Self {
            registry,
            stream: StreamingMarkdown::new(),
            streaming_item: None,
        }
    }

    fn paint(
        &mut self,
        event: &StreamEvent,
        store: &ConversationStore,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        match (&event.component_type, event.op) {
            (ComponentKind::Markdown, EventOp::Create | EventOp::Append) => {
                if self.streaming_item.as_deref() != Some(event.item_id.as_str()) {
                    self.finish_stream(out)?;
                    self.streaming_item = Some(event.item_id.clone());
                }
                if let Some(fragment) = fragment_text(&event.payload) {
                    self.stream.process(fragment, out)?;
                }
            }
            (ComponentKind::Markdown, EventOp::Finalize) => {
                if self.streaming_item.as_deref() == Some(event.item_id.as_str()) {
                    self.finish_stream(out)?;
                    if let Some(error) = &event.error {
                        writeln!(out, "✗ {}", error)?;
                    }
                } else {
                    // Delivered whole (a poll result); render it styled.
                    self.render_full(event, store, out)?;
                }
            }
            (_, EventOp::Finalize) => {
                self.finish_stream(out)?;
                self.render_full(event, store, out)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn render_full(
        &self,
        event: &StreamEvent,
        store: &ConversationStore,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        let item = store
            .get(&event.conversation_id)
            .and_then(|conv| conv.item(&event.item_id).cloned());
        if let Some(item) = item {
            self.registry.render_item(&item, out)?;
            out.flush()?;
        }
        Ok(())
    }

    fn finish_stream(&mut self, out: &mut impl Write) -> anyhow::Result<()> {
        if self.streaming_item.take().is_some() {
            self.stream.flush(out)?;
        }
        Ok(())
    }
}

/// Pull displayable text out of a markdown payload fragment.
fn fragment_text(payload: &Value) -> Option<&str> {
    match payload {
        Value::String(text) => Some(text),
        Value::Object(map) => map.get("text").and_then(Value::as_str),
        _ => None,
    }
}
