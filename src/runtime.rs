use std::sync::Arc;

use serenity::http::Http;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::ChannelId;
use tokio::sync::Mutex;
use tracing::error;

use crate::clients::discord_chat::DiscordChatPlatform;
use crate::clients::discord_events::DiscordEventMirror;
use crate::clients::github::GithubFileStore;
use crate::clients::google_calendar::GoogleCalendarMirror;
use crate::clients::ports::{ChatPlatform, EventMirror, RemoteFileStore};
use crate::config::Settings;
use crate::error::SyncError;
use crate::events::queue::{Event, EventBus};
use crate::events::worker::EventWorker;
use crate::handlers::discord::BotHandler;
use crate::models::cache::CacheManager;
use crate::service::diff_engine::DiffEngine;
use crate::service::inventory_service::InventoryService;
use crate::service::offnight_service::OffnightService;
use crate::service::raid_service::RaidService;
use crate::service::rate_limit::{Clock, RatePacer, TokioClock};
use crate::service::schedule_file::RAID_NIGHT_PREFIX;
use crate::service::sync_executor::SyncExecutor;
use crate::tasks::timers;

/// Minimum gap between remote file writes.
const FILE_WRITE_INTERVAL_MS: u64 = 1_000;
/// Minimum gap between calendar mutations.
const CALENDAR_CALL_INTERVAL_MS: u64 = 1_000;
/// Discord scheduled-event mutations are paced much harder; the API rate
/// limits event writes aggressively.
const DISCORD_EVENT_CALL_INTERVAL_MS: u64 = 15_000;
/// Minimum gap between channel notices.
const NOTICE_INTERVAL_MS: u64 = 15_000;

const EVENT_BUS_BUFFER: usize = 64;

fn parse_channel(key: &'static str, raw: &str) -> Result<ChannelId, SyncError> {
    raw.parse::<u64>()
        .map(ChannelId::new)
        .map_err(|_| SyncError::Fatal(format!("{key} is not a valid channel id: {raw}")))
}

/// Wires every service together and runs the bot until the gateway
/// connection ends.
pub async fn run(settings: Settings) -> Result<(), SyncError> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let cache = Arc::new(Mutex::new(CacheManager::load(&settings.cache_path)));
    crate::models::cache::warn_if_unwritable(&settings.cache_path);

    let http = Arc::new(Http::new(&settings.discord_token));
    let chat: Arc<dyn ChatPlatform> =
        Arc::new(DiscordChatPlatform::new(http, settings.guild_id));
    let store: Arc<dyn RemoteFileStore> = Arc::new(GithubFileStore::new(
        settings.github_token.clone(),
        settings.github_owner.clone(),
        settings.github_repo.clone(),
        settings.github_branch.clone(),
    ));
    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::new(RatePacer::new(FILE_WRITE_INTERVAL_MS, Arc::clone(&clock))),
    ));

    let scheduled_mirror: Arc<dyn EventMirror> = Arc::new(DiscordEventMirror::new(
        settings.discord_token.clone(),
        settings.guild_id.to_string(),
        settings.event_location.clone(),
    ));
    let mut raid_mirrors = vec![Arc::new(DiffEngine::new(
        Arc::clone(&scheduled_mirror),
        Arc::new(RatePacer::new(DISCORD_EVENT_CALL_INTERVAL_MS, Arc::clone(&clock))),
        Arc::clone(&clock),
        Vec::new(),
    ))];
    let mut offnight_mirrors = vec![Arc::new(DiffEngine::new(
        scheduled_mirror,
        Arc::new(RatePacer::new(DISCORD_EVENT_CALL_INTERVAL_MS, Arc::clone(&clock))),
        Arc::clone(&clock),
        vec![RAID_NIGHT_PREFIX.to_string()],
    ))];

    if let Some(calendar) = &settings.calendar {
        let raid_calendar: Arc<dyn EventMirror> = Arc::new(GoogleCalendarMirror::new(
            calendar.token.clone(),
            calendar.raid_calendar_id.clone(),
        ));
        raid_mirrors.push(Arc::new(DiffEngine::new(
            raid_calendar,
            Arc::new(RatePacer::new(CALENDAR_CALL_INTERVAL_MS, Arc::clone(&clock))),
            Arc::clone(&clock),
            Vec::new(),
        )));
        let offnight_calendar: Arc<dyn EventMirror> = Arc::new(GoogleCalendarMirror::new(
            calendar.token.clone(),
            calendar.offnight_calendar_id.clone(),
        ));
        offnight_mirrors.push(Arc::new(DiffEngine::new(
            offnight_calendar,
            Arc::new(RatePacer::new(CALENDAR_CALL_INTERVAL_MS, Arc::clone(&clock))),
            Arc::clone(&clock),
            vec![RAID_NIGHT_PREFIX.to_string()],
        )));
    }

    let raid = Arc::new(RaidService::new(
        Arc::clone(&chat),
        Arc::clone(&store),
        Arc::clone(&executor),
        Arc::clone(&cache),
        raid_mirrors,
        settings.raid_channel_id.clone(),
        settings.raid_file_path.clone(),
    ));
    let offnight = Arc::new(OffnightService::new(
        Arc::clone(&chat),
        Arc::clone(&store),
        Arc::clone(&executor),
        Arc::clone(&cache),
        offnight_mirrors,
        settings.offnight_channel_id.clone(),
        settings.offnight_file_path.clone(),
    ));
    let inventory = Arc::new(InventoryService::new(
        Arc::clone(&chat),
        Arc::clone(&executor),
        Arc::clone(&cache),
        Arc::new(RatePacer::new(NOTICE_INTERVAL_MS, Arc::clone(&clock))),
        settings.inventory_channel_id.clone(),
    ));

    let (bus, rx) = EventBus::new(EVENT_BUS_BUFFER);
    let worker = EventWorker {
        raid,
        offnight,
        inventory,
        chat,
        cache,
    };
    tokio::spawn(worker.run(rx));

    let schedules = [
        (Event::RaidPoll, timers::RAID_POLL_INTERVAL),
        (Event::InventoryPoll, timers::INVENTORY_POLL_INTERVAL),
        (Event::OffnightPoll, timers::OFFNIGHT_POLL_INTERVAL),
        (Event::MirrorSync, timers::MIRROR_SYNC_INTERVAL),
        (Event::RemoteDriftCheck, timers::DRIFT_CHECK_INTERVAL),
        (Event::CacheCleanup, timers::CACHE_CLEANUP_INTERVAL),
    ];
    for (event, interval) in schedules {
        tokio::spawn(timers::run_timer_loop(bus.clone(), event, interval));
    }

    let handler = BotHandler::new(
        bus,
        parse_channel("RAID_CHANNEL_ID", &settings.raid_channel_id)?,
        parse_channel("OFFNIGHT_CHANNEL_ID", &settings.offnight_channel_id)?,
        parse_channel("INVENTORY_CHANNEL_ID", &settings.inventory_channel_id)?,
    );
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::Client::builder(&settings.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| SyncError::Fatal(format!("error creating Discord client: {e}")))?;

    if let Err(why) = client.start().await {
        error!("client error: {why:?}");
    }
    Ok(())
}

/// One-shot maintenance entry point: drop past lines from the offnight file
/// on the remote store and exit.
pub async fn run_cleanup(settings: Settings) -> (usize, usize) {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let cache = Arc::new(Mutex::new(CacheManager::load(&settings.cache_path)));
    let http = Arc::new(Http::new(&settings.discord_token));
    let chat: Arc<dyn ChatPlatform> =
        Arc::new(DiscordChatPlatform::new(http, settings.guild_id));
    let store: Arc<dyn RemoteFileStore> = Arc::new(GithubFileStore::new(
        settings.github_token.clone(),
        settings.github_owner.clone(),
        settings.github_repo.clone(),
        settings.github_branch.clone(),
    ));
    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::new(RatePacer::new(FILE_WRITE_INTERVAL_MS, Arc::clone(&clock))),
    ));
    let offnight = OffnightService::new(
        chat,
        store,
        executor,
        cache,
        Vec::new(),
        settings.offnight_channel_id.clone(),
        settings.offnight_file_path.clone(),
    );
    offnight.cleanup_past(chrono::Utc::now()).await
}
