//! An FSD server for flight-simulation networks: CRLF-framed TCP protocol
//! sessions, a geohash-bucketed post office for proximity fan-out, and a
//! token-gated admin HTTP channel.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod metar;
pub mod post_office;
pub mod server;
pub mod session;
pub mod web;
pub mod wire;
