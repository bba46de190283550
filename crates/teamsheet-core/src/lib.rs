// Library root for the team-selection engine and its storage.

pub mod config;
pub mod db;
pub mod error;
pub mod formation;
pub mod provider;
pub mod roster_csv;
pub mod types;
