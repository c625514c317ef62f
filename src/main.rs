#![allow(non_snake_case)]

use std::env;

use chrono::Utc;
use clap::Parser;
use tracing::error;

use guildSyncBot::cli::{CacheResource, Cli, Command};
use guildSyncBot::config::{AppConfig, Settings};
use guildSyncBot::models::cache::{get_cache_location, CacheManager, ResourceClass};
use guildSyncBot::models::event::EventOrigin;
use guildSyncBot::service::thread_parser;
use guildSyncBot::{logging, runtime};

#[tokio::main]
async fn main() {
    logging::init();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    };
    let get_prop = |key: &str| -> Option<String> {
        config.get(key).or_else(|| env::var(key).ok())
    };

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let settings = load_settings(&get_prop);
            if let Err(err) = runtime::run(settings).await {
                error!("fatal: {err}");
                std::process::exit(1);
            }
        }
        Command::ParseTitle { title } => {
            match thread_parser::parse_thread_title(&title, Utc::now(), EventOrigin::default()) {
                Some(event) => {
                    println!("title:     {}", event.title);
                    println!("date:      {}", event.date);
                    println!("time:      {}", event.time);
                    if let Some(range) = &event.time_range {
                        println!("range:     {range}");
                    }
                    if let Some(host) = &event.host {
                        println!("host:      {host}");
                    }
                    println!("recurring: {}", event.is_recurring);
                }
                None => println!("no event found in title"),
            }
        }
        Command::ClearCache { resource } => {
            let path = get_prop("CACHE_LOCATION").unwrap_or_else(get_cache_location);
            let mut cache = CacheManager::load(&path);
            let class = match resource {
                CacheResource::Raid => ResourceClass::Raid,
                CacheResource::Offnight => ResourceClass::Offnight,
            };
            cache.clear(class);
            match cache.save() {
                Ok(()) => println!("cleared {resource:?} cache at {path}"),
                Err(err) => {
                    error!("failed to save cache: {err}");
                    std::process::exit(1);
                }
            }
        }
        Command::Cleanup => {
            let settings = load_settings(&get_prop);
            let (removed, preserved) = runtime::run_cleanup(settings).await;
            println!("removed {removed} past entries, preserved {preserved}");
        }
    }
}

fn load_settings<F>(get: &F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    match Settings::load(get) {
        Ok(settings) => settings,
        Err(err) => {
            error!("configuration error: {err}");
            std::process::exit(1);
        }
    }
}
