pub mod discord_chat;
pub mod discord_events;
pub mod github;
pub mod google_calendar;
pub mod ports;
