// ============================================================================
// chenda – whale signal dashboard & upstream proxy
// ============================================================================
//
// Overview:
//  1. config     – config.json + env overrides
//  2. error      – crate level error
//  3. symbol     – pair / base asset normalisation
//  4. icon       – placeholder icons & remote logo probing
//  5. timestamp  – one time parser for every feed representation
//  6. feed       – HTTP feed client & response adapters
//  7. store      – JSON-lines document store with live notifications
//  8. render     – HTML fragments (full replace)
//  9. dashboard  – tab/filter state, poller, HTTP server
// 10. proxy      – upstream relay & alert sink
// 11. server     – logging, port scan, graceful shutdown
// 12. service    – market signal service: universe, books, alerts
// ============================================================================

pub mod config;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod icon;
pub mod proxy;
pub mod render;
pub mod server;
pub mod service;
pub mod store;
pub mod symbol;
pub mod timestamp;

pub use error::{Error, Result};
