//! Per-client fixed-window rate limiting (C2)
//!
//! Contract: a token bucket backed by atomic counters in a shared store,
//! one bucket per client, reset on a fixed window (`decay_seconds`).
//! `increment_attempts` must be atomic across concurrent callers; when a
//! client has no configured `max_attempts`, every operation is a no-op
//! that reports the unlimited sentinel and never logs a refusal.

#[ cfg( feature = "enabled" ) ]
#[ allow( clippy::std_instead_of_core ) ]
mod private
{
  use std::collections::HashMap;
  use std::sync::Arc;
  use std::time::{ Duration, SystemTime, UNIX_EPOCH };
  use parking_lot::Mutex;

  /// Sentinel returned by `get_remaining_attempts` for unlimited clients
  pub const UNLIMITED : u64 = u64::MAX;

  /// One client's rate-limit configuration
  #[ derive( Debug, Clone, Copy ) ]
  pub struct RateLimiterConfig
  {
    /// Maximum attempts per window; `None` means unlimited
    max_attempts : Option< u64 >,
    /// Window length in seconds
    decay_seconds : u64,
  }

  impl RateLimiterConfig
  {
    /// Create an explicit configuration
    ///
    /// # Panics
    ///
    /// Panics if `decay_seconds` is zero and `max_attempts` is `Some`
    #[ must_use ]
    pub fn with_explicit_config( max_attempts : Option< u64 >, decay_seconds : u64 ) -> Self
    {
      assert!
      (
        max_attempts.is_none() || decay_seconds > 0,
        "decay_seconds must be > 0 for a bounded client"
      );
      Self { max_attempts, decay_seconds }
    }

    /// Compatibility wrapper with sensible defaults : 60 attempts per 60s window
    ///
    /// NOTE: for explicit control use `with_explicit_config`
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::with_explicit_config( Some( 60 ), 60 )
    }

    /// Set the max-attempts ceiling; `None` marks the client unlimited
    #[ must_use ]
    pub fn with_max_attempts( mut self, max_attempts : Option< u64 > ) -> Self
    {
      self.max_attempts = max_attempts;
      self
    }

    /// Set the window length
    #[ must_use ]
    pub fn with_decay_seconds( mut self, decay_seconds : u64 ) -> Self
    {
      self.decay_seconds = decay_seconds;
      self
    }

    /// Maximum attempts per window, if bounded
    #[ must_use ]
    pub fn max_attempts( &self ) -> Option< u64 >
    {
      self.max_attempts
    }

    /// Window length in seconds
    #[ must_use ]
    pub fn decay_seconds( &self ) -> u64
    {
      self.decay_seconds
    }
  }

  impl Default for RateLimiterConfig
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  #[ derive( Debug, Clone, Copy ) ]
  struct Bucket
  {
    used : u64,
    expires_at_secs : u64,
  }

  /// Shared fast-store abstraction behind the rate limiter
  ///
  /// The in-memory default is process-local; a deployment that runs more
  /// than one process sharing the same clients needs a store backed by a
  /// real shared service (Redis, etc.) implementing this trait instead.
  pub trait RateLimitStore : Send + Sync + std::fmt::Debug
  {
    /// Atomically add `amount` to the bucket for `key`, arming a fresh
    /// expiry of `decay_seconds` from now if the bucket does not exist or
    /// has already expired. Returns the attempts used after the add.
    fn increment( &self, key : &str, amount : u64, decay_seconds : u64, now_secs : u64 ) -> u64;

    /// Attempts used in the current window, or 0 if the bucket is absent
    /// or expired.
    fn used( &self, key : &str, now_secs : u64 ) -> u64;

    /// Seconds remaining until the bucket's window resets, or 0 if absent,
    /// expired, or already reset.
    fn available_in( &self, key : &str, now_secs : u64 ) -> u64;

    /// Delete the bucket for `key`.
    fn clear( &self, key : &str );
  }

  /// Default process-local store, backed by a lock-guarded map
  #[ derive( Debug, Default ) ]
  pub struct InMemoryRateLimitStore
  {
    buckets : Mutex< HashMap< String, Bucket > >,
  }

  impl InMemoryRateLimitStore
  {
    /// Create an empty store
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }
  }

  impl RateLimitStore for InMemoryRateLimitStore
  {
    fn increment( &self, key : &str, amount : u64, decay_seconds : u64, now_secs : u64 ) -> u64
    {
      let mut buckets = self.buckets.lock();
      let bucket = buckets.entry( key.to_string() ).or_insert( Bucket { used : 0, expires_at_secs : 0 } );
      if bucket.expires_at_secs == 0 || now_secs >= bucket.expires_at_secs
      {
        bucket.used = 0;
        bucket.expires_at_secs = now_secs + decay_seconds;
      }
      bucket.used = bucket.used.saturating_add( amount );
      bucket.used
    }

    fn used( &self, key : &str, now_secs : u64 ) -> u64
    {
      let buckets = self.buckets.lock();
      match buckets.get( key )
      {
        Some( bucket ) if bucket.expires_at_secs > now_secs => bucket.used,
        _ => 0,
      }
    }

    fn available_in( &self, key : &str, now_secs : u64 ) -> u64
    {
      let buckets = self.buckets.lock();
      match buckets.get( key )
      {
        Some( bucket ) if bucket.expires_at_secs > now_secs => bucket.expires_at_secs - now_secs,
        _ => 0,
      }
    }

    fn clear( &self, key : &str )
    {
      self.buckets.lock().remove( key );
    }
  }

  /// Read-only counters describing how a rate limiter has been used
  #[ derive( Debug, Clone, Copy, Default ) ]
  pub struct RateLimiterMetrics
  {
    requests_allowed : u64,
    requests_blocked : u64,
  }

  impl RateLimiterMetrics
  {
    /// Requests that passed `allow_request`
    #[ must_use ]
    pub fn requests_allowed( &self ) -> u64
    {
      self.requests_allowed
    }

    /// Requests refused by `allow_request`
    #[ must_use ]
    pub fn requests_blocked( &self ) -> u64
    {
      self.requests_blocked
    }
  }

  fn now_secs() -> u64
  {
    SystemTime::now().duration_since( UNIX_EPOCH ).unwrap_or( Duration::ZERO ).as_secs()
  }

  /// Façade over one client's rate-limit bucket
  #[ derive( Debug, Clone ) ]
  pub struct RateLimiter
  {
    client : String,
    config : RateLimiterConfig,
    store : Arc< dyn RateLimitStore >,
    metrics : Arc< Mutex< RateLimiterMetrics > >,
  }

  impl RateLimiter
  {
    /// Build a rate limiter for `client` over the given store
    #[ must_use ]
    pub fn new( client : impl Into< String >, config : RateLimiterConfig, store : Arc< dyn RateLimitStore > ) -> Self
    {
      Self
      {
        client : client.into(),
        config,
        store,
        metrics : Arc::new( Mutex::new( RateLimiterMetrics::default() ) ),
      }
    }

    /// Convenience constructor backed by the in-memory default store
    #[ must_use ]
    pub fn with_in_memory_store( client : impl Into< String >, config : RateLimiterConfig ) -> Self
    {
      Self::new( client, config, Arc::new( InMemoryRateLimitStore::new() ) )
    }

    /// Deterministic key this client's bucket lives under
    #[ must_use ]
    pub fn rate_limit_key( &self ) -> String
    {
      format!( "api-cache:rate-limit:{}", self.client )
    }

    /// Configured ceiling, `None` when unlimited
    #[ must_use ]
    pub fn max_attempts( &self ) -> Option< u64 >
    {
      self.config.max_attempts()
    }

    /// Configured window length
    #[ must_use ]
    pub fn decay_seconds( &self ) -> u64
    {
      self.config.decay_seconds()
    }

    /// Attempts remaining in the current window; `UNLIMITED` sentinel when
    /// the client has no configured ceiling.
    #[ must_use ]
    pub fn remaining_attempts( &self ) -> u64
    {
      let Some( max ) = self.config.max_attempts() else { return UNLIMITED };
      let used = self.store.used( &self.rate_limit_key(), now_secs() );
      max.saturating_sub( used )
    }

    /// Seconds until the window resets; `0` when attempts remain or the
    /// client is unlimited.
    #[ must_use ]
    pub fn available_in( &self ) -> u64
    {
      if self.config.max_attempts().is_none()
      {
        return 0;
      }
      self.store.available_in( &self.rate_limit_key(), now_secs() )
    }

    /// True iff at least one attempt remains; unlimited clients are always
    /// true. Logs a warning with the retry hint on refusal.
    pub fn allow_request( &self ) -> bool
    {
      if self.config.max_attempts().is_none()
      {
        return true;
      }
      let remaining = self.remaining_attempts();
      let allowed = remaining >= 1;
      let mut metrics = self.metrics.lock();
      if allowed
      {
        metrics.requests_allowed += 1;
      }
      else
      {
        metrics.requests_blocked += 1;
        tracing::warn!
        (
          client = %self.client,
          available_in = self.available_in(),
          "rate limit exceeded"
        );
      }
      allowed
    }

    /// Atomically add `amount` attempts to the current window; a no-op for
    /// unlimited clients.
    pub fn increment_attempts( &self, amount : u64 )
    {
      if self.config.max_attempts().is_none()
      {
        return;
      }
      self.store.increment( &self.rate_limit_key(), amount, self.config.decay_seconds(), now_secs() );
    }

    /// Delete the bucket, starting a fresh window on next use
    pub fn clear( &self )
    {
      self.store.clear( &self.rate_limit_key() );
    }

    /// Snapshot of allow/block counters observed through this façade
    #[ must_use ]
    pub fn metrics( &self ) -> RateLimiterMetrics
    {
      *self.metrics.lock()
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn unlimited_client_is_always_allowed()
    {
      let config = RateLimiterConfig::with_explicit_config( None, 60 );
      let limiter = RateLimiter::with_in_memory_store( "acme", config );
      for _ in 0..1000
      {
        assert!( limiter.allow_request() );
        limiter.increment_attempts( 1 );
      }
      assert_eq!( limiter.remaining_attempts(), UNLIMITED );
      assert_eq!( limiter.available_in(), 0 );
    }

    #[ test ]
    fn bounded_client_exhausts_and_reports_retry_hint()
    {
      let config = RateLimiterConfig::with_explicit_config( Some( 2 ), 60 );
      let limiter = RateLimiter::with_in_memory_store( "acme", config );

      assert!( limiter.allow_request() );
      limiter.increment_attempts( 1 );
      assert!( limiter.allow_request() );
      limiter.increment_attempts( 1 );

      assert!( !limiter.allow_request() );
      assert_eq!( limiter.remaining_attempts(), 0 );
      assert!( limiter.available_in() > 0 );
      assert_eq!( limiter.metrics().requests_blocked(), 1 );
    }

    #[ test ]
    fn clear_resets_the_window()
    {
      let config = RateLimiterConfig::with_explicit_config( Some( 1 ), 60 );
      let limiter = RateLimiter::with_in_memory_store( "acme", config );
      limiter.increment_attempts( 1 );
      assert_eq!( limiter.remaining_attempts(), 0 );
      limiter.clear();
      assert_eq!( limiter.remaining_attempts(), 1 );
    }

    #[ test ]
    fn increment_is_atomic_across_threads()
    {
      let store : Arc< dyn RateLimitStore > = Arc::new( InMemoryRateLimitStore::new() );
      let config = RateLimiterConfig::with_explicit_config( Some( 1000 ), 60 );
      let limiter = Arc::new( RateLimiter::new( "acme", config, store ) );

      let handles : Vec< _ > = ( 0..10 ).map( | _ |
      {
        let limiter = Arc::clone( &limiter );
        std::thread::spawn( move ||
        {
          for _ in 0..50
          {
            limiter.increment_attempts( 1 );
          }
        } )
      } ).collect();

      for handle in handles
      {
        handle.join().unwrap();
      }

      assert_eq!( limiter.remaining_attempts(), 1000 - 500 );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    RateLimiterConfig,
    RateLimiterMetrics,
    RateLimiter,
    RateLimitStore,
    InMemoryRateLimitStore,
    UNLIMITED,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
