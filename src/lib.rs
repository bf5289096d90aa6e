//! kitscout: phishing kit discovery from public threat-intelligence feeds.
//!
//! Feeds ([`feed`]) supply raw URLs, [`candidate`] turns them into a sorted
//! set of origins and path prefixes, and [`crawler::Crawler`] probes each one
//! concurrently with a [`probe::Probe`] implementation.

pub mod candidate;
pub mod config;
pub mod crawler;
pub mod feed;
pub mod http;
pub mod probe;
