#![ doc( html_root_url = "https://docs.rs/api_cache/latest/api_cache/" ) ]
#![ cfg_attr( doc, doc = include_str!( concat!( env!( "CARGO_MANIFEST_DIR" ), "/", "readme.md" ) ) ) ]

#![ allow( clippy::missing_inline_in_public_items ) ]
#![ allow( clippy::std_instead_of_core ) ]
#![ allow( clippy::must_use_candidate ) ]

//! Core of a multi-tenant API caching and rate-limiting gateway
//!
//! Sits in front of outbound calls to third-party HTTP APIs and gives
//! every upstream-client facade the same pipeline: deterministic cache
//! keys, a per-client response cache, per-client token-bucket rate
//! limiting, optional symmetric compression of stored bodies, a
//! tag-threading pattern for asynchronous provider task queues, and a
//! framework for normalizing cached responses into relational tables.
//!
//! ## Governing principle: explicit construction over singletons
//!
//! There is no ambient global cache manager or config object. A
//! [`CacheManager`] is built explicitly over explicit storage and
//! rate-limit backends; a [`config::ClientConfig`] is built explicitly
//! from its fields. Components are composed by the caller, not
//! discovered through a registry.
//!
//! ## Core modules
//!
//! - [`compression`] (C1): symmetric byte transform gated by a per-client flag.
//! - [`rate_limit`] (C2): per-client fixed-window token bucket.
//! - [`cache_key`] (C3): deterministic SHA-256 cache keys over canonical JSON.
//! - [`storage`] (C4): per-client response storage and the shared error log.
//! - [`cache_manager`] (C5): the single façade composing C1–C4 and C2.
//! - [`client`] (C6): cache → rate-limit → dispatch → store, single and parallel.
//! - [`webhook`] (C7): the tag-threading pattern for deferred-task providers.
//! - [`processor`] (C8): normalizes cached responses into relational tables.
//!
//! # Examples
//!
//! ```
//! use api_cache::{ CacheManager, RateLimiterConfig };
//!
//! let manager = CacheManager::with_in_memory_stores
//! (
//!   "acme",
//!   "v1",
//!   false,
//!   RateLimiterConfig::with_explicit_config( Some( 100 ), 60 ),
//! );
//!
//! assert!( manager.allow_request() );
//! assert_eq!( manager.remaining_attempts(), 100 );
//! ```

#[ cfg( feature = "enabled" ) ]
use mod_interface::mod_interface;

mod private {}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  layer error;
  layer secret;
  layer config;
  #[ cfg( feature = "compression" ) ]
  layer compression;
  layer rate_limit;
  layer cache_key;
  layer storage;
  layer cache_manager;
  layer client;
  layer webhook;
  layer processor;
}

/// Serde-related exports.
#[ cfg( feature = "enabled" ) ]
pub mod ser
{
  pub use serde::
  {
    Serialize,
    Deserialize,
  };
  pub use serde_with::*;
}

/// Error-related exports.
#[ cfg( feature = "enabled" ) ]
pub mod error_tools
{
  pub use::error_tools::*;
  pub use::error_tools::dependency::thiserror;
}
