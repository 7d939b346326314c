//! ord-provider-server — a read-only HTTP provider for Open Resource
//! Discovery (ORD) metadata, backed by a local directory or a shallow
//! GitHub clone that is kept up to date via scheduled polling, webhooks,
//! or manual triggers.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod http;
pub mod observability;
pub mod processor;
pub mod repository;
pub mod snapshot;
pub mod update;
