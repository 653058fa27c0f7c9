pub mod compare;
pub mod config;
pub mod creators;
pub mod fpl_api;
pub mod http_cache;
pub mod http_client;
pub mod logging;
pub mod managers;
pub mod players;
pub mod ranking;
pub mod refresh;
pub mod scheduler;
pub mod similarity;
pub mod squad;
pub mod store;
