//! Telegram Adapter
//!
//! SignalSource backed by the Telegram Bot API. The bot long-polls
//! `getUpdates` for channel posts and messages and forwards every text or
//! caption it sees, tagged with the chat id. Channel filtering happens
//! downstream so that the allow-list lives in one place.
//!
//! The bot has to be a member (admin for channels) of every watched chat.
//!
//! Updates queued while the bot was offline are skipped on the first
//! connect. The update offset lives on the source, so a supervised restart
//! resumes where the previous connection stopped.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Update, UpdateKind};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::Signal;
use crate::ports::signal_source::{SignalSource, SourceError};

/// Extra HTTP time on top of the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Position in the update stream, shared by every connection of a source
#[derive(Debug, Default)]
struct UpdateCursor {
    synced: AtomicBool,
    next: AtomicI32,
}

impl UpdateCursor {
    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn offset(&self) -> i32 {
        self.next.load(Ordering::SeqCst)
    }

    fn advance(&self, update: &Update) {
        self.next.fetch_max(update.id.0 as i32 + 1, Ordering::SeqCst);
    }

    /// Mark everything up to the newest backlog update as seen
    fn skip_backlog(&self, backlog: &[Update]) -> usize {
        for update in backlog {
            self.advance(update);
        }
        self.synced.store(true, Ordering::SeqCst);
        backlog.len()
    }

    /// Advance past `updates` and keep the ones carrying text
    fn accept(&self, updates: &[Update]) -> Vec<Signal> {
        updates
            .iter()
            .filter_map(|update| {
                self.advance(update);
                to_signal(&update.kind)
            })
            .collect()
    }
}

pub struct TelegramSource {
    bot: Bot,
    poll_timeout_secs: u32,
    cursor: UpdateCursor,
}

impl TelegramSource {
    pub fn new(token: impl Into<String>, poll_timeout_secs: u32) -> Result<Self, SourceError> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(poll_timeout_secs as u64) + POLL_GRACE)
            .build()
            .map_err(|e| SourceError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            poll_timeout_secs,
            cursor: UpdateCursor::default(),
        })
    }
}

fn map_request_error(err: RequestError) -> SourceError {
    match err {
        RequestError::Api(ApiError::InvalidToken) => SourceError::Auth("invalid bot token".into()),
        other => SourceError::Connection(other.to_string()),
    }
}

/// Text event carried by an update, if any
fn to_signal(kind: &UpdateKind) -> Option<Signal> {
    let msg = match kind {
        UpdateKind::ChannelPost(msg) | UpdateKind::Message(msg) => msg,
        _ => return None,
    };
    let text = msg.text().or_else(|| msg.caption())?;
    Some(Signal::new(msg.chat.id.0, text))
}

#[async_trait]
impl SignalSource for TelegramSource {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn run(&self, tx: mpsc::Sender<Signal>) -> Result<(), SourceError> {
        let me = self.bot.get_me().await.map_err(map_request_error)?;
        info!(
            "Connected to Telegram as @{}",
            me.user.username.as_deref().unwrap_or("unknown")
        );

        if !self.cursor.is_synced() {
            // Offset -1 returns only the newest pending update
            let backlog = self
                .bot
                .get_updates()
                .offset(-1)
                .timeout(0)
                .allowed_updates(vec![AllowedUpdate::ChannelPost, AllowedUpdate::Message])
                .await
                .map_err(map_request_error)?;
            if self.cursor.skip_backlog(&backlog) > 0 {
                info!("Skipped pending updates up to offset {}", self.cursor.offset());
            }
        }

        loop {
            let updates = self
                .bot
                .get_updates()
                .offset(self.cursor.offset())
                .timeout(self.poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::ChannelPost, AllowedUpdate::Message])
                .await
                .map_err(map_request_error)?;

            for signal in self.cursor.accept(&updates) {
                debug!("Update from chat {}", signal.channel_id);
                tx.send(signal).await.map_err(|_| SourceError::Closed)?;
            }
        }
    }
}
