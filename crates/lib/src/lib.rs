//! SMS relay core library — config, routing, membership, dispatch decision,
//! inline reply building, outbound provider client, worker pool, and the
//! webhook HTTP server used by the `smsrelay` binary.

pub mod config;
pub mod dispatch;
pub mod event;
pub mod membership;
pub mod provider;
pub mod reply;
pub mod routing;
pub mod server;
pub mod worker;
