//! Traffic logging for a chatter.
//!
//! [`apply_logging`] logs every inbound raw frame through an untyped handler
//! and every outbound frame through a send hook. Both events carry the
//! chatter's name (`chatter.<nick>|<channel>`) in the `chatter` field, under
//! the `dotbot::traffic` target.
//!
//! ```rust,ignore
//! let chatter = Chatter::new(connector, SessionParams::new("lounge", "dotbot"));
//! apply_logging(&chatter, TrafficLog::default());
//!
//! // Or with custom lines
//! apply_logging(
//!     &chatter,
//!     TrafficLog::default().on_received(|ctx| format!("<- {}", ctx.message().kind())),
//! );
//! ```

use std::sync::Arc;

use tracing::{Level, debug, error, info, trace, warn};

use dotbot_core::{Chatter, Context, Handler};

/// Builds the line logged for an inbound message.
pub type ReceivedFormatter = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// Builds the line logged for an outbound payload.
pub type SentFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Options for [`apply_logging`].
#[derive(Clone)]
pub struct TrafficLog {
    name: Option<String>,
    level: Level,
    received: Option<ReceivedFormatter>,
    sent: Option<SentFormatter>,
}

impl Default for TrafficLog {
    fn default() -> Self {
        Self {
            name: None,
            level: Level::INFO,
            received: None,
            sent: None,
        }
    }
}

impl TrafficLog {
    /// Overrides the chatter name logged with every line.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the level of traffic events.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Replaces the line logged for inbound messages.
    pub fn on_received<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.received = Some(Arc::new(f));
        self
    }

    /// Replaces the line logged for outbound payloads.
    pub fn on_sent<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.sent = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for TrafficLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficLog")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("custom_received", &self.received.is_some())
            .field("custom_sent", &self.sent.is_some())
            .finish()
    }
}

/// Returns the default traffic log name of `chatter`.
pub fn traffic_log_name(chatter: &Chatter) -> String {
    format!("chatter.{}|{}", chatter.nick(), chatter.channel())
}

fn emit(level: Level, chatter: &str, line: &str) {
    match level {
        Level::TRACE => trace!(target: "dotbot::traffic", chatter = %chatter, "{line}"),
        Level::DEBUG => debug!(target: "dotbot::traffic", chatter = %chatter, "{line}"),
        Level::INFO => info!(target: "dotbot::traffic", chatter = %chatter, "{line}"),
        Level::WARN => warn!(target: "dotbot::traffic", chatter = %chatter, "{line}"),
        _ => error!(target: "dotbot::traffic", chatter = %chatter, "{line}"),
    }
}

/// Logs all traffic of `chatter`. Returns the name used in log lines.
///
/// The name is fixed when this is called; later `set_parameters` calls do not
/// change it.
pub fn apply_logging(chatter: &Chatter, options: TrafficLog) -> String {
    let name: Arc<str> = options
        .name
        .clone()
        .unwrap_or_else(|| traffic_log_name(chatter))
        .into();
    let level = options.level;

    let received = options.received;
    let inbound_name = Arc::clone(&name);
    chatter.register_callback(
        Handler::sync(move |ctx: &Context| {
            let line = match &received {
                Some(format) => format(ctx),
                None => format!("Received message: {}", ctx.message().raw_data()),
            };
            emit(level, &inbound_name, &line);
        }),
        &[],
    );

    let sent = options.sent;
    let outbound_name = Arc::clone(&name);
    chatter.connector().add_send_hook(Arc::new(move |payload: &str| {
        let line = match &sent {
            Some(format) => format(payload),
            None => format!("Sent data: {payload}"),
        };
        emit(level, &outbound_name, &line);
    }));

    name.to_string()
}
