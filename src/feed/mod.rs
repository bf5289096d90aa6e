//! Threat-intelligence feed clients.
//!
//! Each feed is a [`FeedSource`] variant with its own response parser:
//!
//! - **urlscan**: JSON search results, `task.url` per record
//! - **OpenPhish**: plaintext, one URL per line
//! - **PhishTank**: CSV table, `url` column per row
//!
//! A feed never fails its caller. Transport errors, non-200 responses and
//! unparseable bodies all degrade to an empty URL list.
//!
//! # Example
//!
//! ```ignore
//! use crate::feed::FeedSource;
//!
//! let feed = FeedSource::OpenPhish { base: "https://openphish.com".into() };
//! let urls = feed.fetch(&client, timeout).await;
//! ```

mod parser;
mod source;

pub use parser::{parse_openphish, parse_phishtank, parse_urlscan};
pub use source::{Endpoints, FeedSource};
