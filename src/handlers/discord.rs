use serenity::async_trait;
use serenity::model::channel::{GuildChannel, Message};
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tracing::info;

use crate::events::queue::{Event, EventBus};
use crate::service::inventory_service::is_inventory_file;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Gateway handler. It only watches the configured channels and translates
/// gateway traffic into bus events; every reconciliation runs on the
/// worker, never here.
pub struct BotHandler {
    bus: EventBus,
    raid_channel: ChannelId,
    offnight_channel: ChannelId,
    inventory_channel: ChannelId,
}

impl BotHandler {
    pub fn new(
        bus: EventBus,
        raid_channel: ChannelId,
        offnight_channel: ChannelId,
        inventory_channel: ChannelId,
    ) -> Self {
        Self {
            bus,
            raid_channel,
            offnight_channel,
            inventory_channel,
        }
    }
}

fn image_mime(filename: &str) -> Option<String> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    };
    Some(mime)
}

fn image_key(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
        .to_lowercase()
}

#[async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected", ready.user.name);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if msg.channel_id == self.raid_channel && !msg.content.is_empty() {
            self.bus
                .emit(Event::RaidMessage {
                    content: msg.content.clone(),
                })
                .await;
        }

        if msg.channel_id == self.inventory_channel {
            for attachment in &msg.attachments {
                if is_inventory_file(&attachment.filename) {
                    self.bus
                        .emit(Event::InventoryAttachment {
                            file_name: attachment.filename.clone(),
                            url: attachment.url.clone(),
                        })
                        .await;
                }
            }
        }

        if msg.channel_id == self.offnight_channel {
            for attachment in &msg.attachments {
                if let Some(mime) = image_mime(&attachment.filename) {
                    self.bus
                        .emit(Event::CoverImage {
                            key: image_key(&attachment.filename),
                            url: attachment.url.clone(),
                            mime,
                        })
                        .await;
                }
            }
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        if event.channel_id != self.raid_channel {
            return;
        }
        if event.author.as_ref().map(|a| a.bot).unwrap_or(false) {
            return;
        }
        if let Some(content) = event.content {
            if !content.is_empty() {
                self.bus.emit(Event::RaidMessage { content }).await;
            }
        }
    }

    async fn thread_create(&self, _ctx: Context, thread: GuildChannel) {
        if thread.parent_id == Some(self.offnight_channel) {
            info!("new offnight thread: {}", thread.name);
            self.bus.emit(Event::OffnightPoll).await;
        }
    }
}
