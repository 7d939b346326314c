//! Router Surface (C8): the HTTP front end tying every other component
//! together into one served API.
//!
//! # Endpoints
//!
//! - `/.well-known/open-resource-discovery` - ORD configuration document
//! - `/ord/v1/*` - ORD documents and resource definition files (protected)
//! - `/api/v1/webhook/github` - update trigger
//! - `/api/v1/status` - update/cache state
//! - `/health` - liveness
//! - `/status` - human dashboard

mod config;
mod routes;
mod server;
pub mod state;
pub mod webhook;

pub use server::{build_router, run};
