pub mod checksum;
pub mod diff_engine;
pub mod inventory_service;
pub mod offnight_service;
pub mod raid_service;
pub mod raid_schedule;
pub mod rate_limit;
pub mod recurrence;
pub mod schedule_file;
pub mod sync_executor;
pub mod thread_parser;
pub mod time_resolver;
