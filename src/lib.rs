pub mod classify;
pub mod cli;
pub mod comment_store;
pub mod config;
pub mod dates;
pub mod fetch_cache;
pub mod http_client;
pub mod identity;
pub mod karma_source;
pub mod lineup_extract;
pub mod linker;
pub mod model;
pub mod patterns;
pub mod pipeline;
pub mod ranked_history;
pub mod result_extract;
pub mod text_util;
