//! kuckmal: streaming ingestion of MediathekView broadcast lists into a
//! local SQLite catalog.
//!
//! A list is decoded record by record ([`parse`]), merged into the catalog in
//! batches ([`ingest`], [`store`]) and kept current by the update policy
//! ([`update`]), which picks between a full reload and a differential list.

pub mod commands;
pub mod config;
pub mod error;
pub mod ingest;
pub mod media;
pub mod parse;
pub mod progress;
pub mod store;
pub mod update;
