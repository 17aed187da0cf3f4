pub mod app;
pub mod checksum;
pub mod config;
pub mod daily;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod fs_util;
pub mod ledger;
pub mod listing;
pub mod monthly;
pub mod output;
pub mod store;
pub mod transfer;
pub mod vision;
