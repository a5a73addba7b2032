//! Echo Bot Example
//!
//! A small command bot showing the main pieces of dotbot:
//!
//! - a [`Module`] bundling synchronous command handlers
//! - an async handler scheduled on the event loop
//! - the receive bridge, awaiting the next message from inside a handler
//! - traffic logging and configuration through the runtime
//!
//! # Usage
//!
//! ```bash
//! # hack.chat, channel and nick from the command line
//! cargo run --package echo-bot -- --channel lounge --nick echobot
//!
//! # IDNS, everything else from dotbot.toml / DOTBOT_* variables
//! cargo run --package echo-bot -- --site idns --country CN
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use dotbot::core::{Context, Module, Receiver, UserInfo, apply_recv};
use dotbot::prelude::*;
use dotbot::runtime::config::{ConfigLoader, DotbotConfig};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A small command bot for hack.chat and IDNS")]
struct Args {
    /// Configuration file (defaults to dotbot.toml in the usual places).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service to connect to: hc or idns.
    #[arg(long)]
    site: Option<String>,

    /// WebSocket endpoint override.
    #[arg(long)]
    url: Option<String>,

    /// Channel to join.
    #[arg(long)]
    channel: Option<String>,

    /// Nickname to join as.
    #[arg(long)]
    nick: Option<String>,

    /// Channel password (hack.chat only).
    #[arg(long)]
    password: Option<String>,

    /// Country code (IDNS only).
    #[arg(long)]
    country: Option<String>,

    /// Log every frame sent and received.
    #[arg(long)]
    log_traffic: bool,
}

impl Args {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply(self, config: &mut DotbotConfig) {
        let chatter = &mut config.chatter;
        if let Some(site) = self.site {
            chatter.site = site;
        }
        if self.url.is_some() {
            chatter.url = self.url;
        }
        if let Some(channel) = self.channel {
            chatter.channel = channel;
        }
        if let Some(nick) = self.nick {
            chatter.nick = nick;
        }
        if self.password.is_some() {
            chatter.password = self.password;
        }
        if self.country.is_some() {
            chatter.country = self.country;
        }
        chatter.log_traffic |= self.log_traffic;
    }
}

const HELP_TEXT: &str = "Commands: !echo <text>, !ping, !help, !whoami, !later, !next";

/// Returns the command text of a message not sent by the bot itself.
fn command(ctx: &Context) -> Option<&str> {
    let message = ctx.message();
    if message.is_feedback() {
        return None;
    }
    message.text().map(str::trim)
}

fn reply(ctx: &Context, text: &str) {
    if let Err(e) = ctx.reply(text) {
        error!(error = %e, "Failed to send reply");
    }
}

/// Synchronous command handlers, shared by every chat-like message type.
fn commands_module() -> Module {
    let mut module = Module::new("commands");
    let kinds = ["chat", "whisper", "message"];

    module.register_callback(
        Handler::sync(|ctx: &Context| {
            let Some(text) = command(ctx) else { return };

            if let Some(rest) = text.strip_prefix("!echo ") {
                reply(ctx, rest);
            } else if text == "!ping" {
                reply(ctx, "pong");
            } else if text == "!help" {
                reply(ctx, HELP_TEXT);
            } else if text == "!whoami" {
                let line = match ctx.message().sender() {
                    Some(user) => format!(
                        "you are {} (trip {})",
                        user.nick().unwrap_or("?"),
                        user.trip().unwrap_or("none")
                    ),
                    None => "no sender on this message".to_owned(),
                };
                reply(ctx, &line);
            }
        }),
        &kinds,
    );

    module.after_apply(|chatter| {
        info!(nick = %chatter.nick(), "Command module applied");
    });
    module
}

/// Async handlers: a delayed reply, and one that awaits the next message.
fn async_module(recv: Arc<Receiver>) -> Module {
    let mut module = Module::new("async");

    for kind in ["chat", "message"] {
        module.on_async(kind, |ctx: Context| async move {
            if command(&ctx) == Some("!later") {
                tokio::time::sleep(Duration::from_secs(2)).await;
                reply(&ctx, "two seconds later");
            }
        });

        let recv = Arc::clone(&recv);
        module.on_async(kind, move |ctx: Context| {
            let recv = Arc::clone(&recv);
            async move {
                if command(&ctx) != Some("!next") {
                    return;
                }
                reply(&ctx, "waiting for the next message...");
                match recv.recv_message().await {
                    Ok(next) => {
                        let who = next
                            .sender()
                            .and_then(|user| user.nick().map(str::to_owned))
                            .unwrap_or_else(|| "nobody".to_owned());
                        reply(&ctx, &format!("next was a {} from {who}", next.kind()));
                    }
                    Err(e) => error!(error = %e, "Receive bridge closed"),
                }
            }
        });
    }
    module
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let mut config = loader.load().context("failed to load configuration")?;
    args.apply(&mut config);

    let runtime = DotbotRuntime::from_config(config).context("failed to build runtime")?;
    let chatter = runtime.chatter();

    let recv = apply_recv(chatter);
    chatter.apply(&commands_module());
    chatter.apply(&async_module(recv));

    runtime.run().await?;
    Ok(())
}
