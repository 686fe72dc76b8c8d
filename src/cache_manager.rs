//! Cache manager — the single façade a client depends on (C5)
//!
//! Composes C1 (compression), C2 (rate limiting), C3 (key generation) and
//! C4 (storage) behind one surface: `generate_cache_key`,
//! `get_cached_response`, `store_response`, `allow_request`,
//! `increment_attempts`, `remaining_attempts`, `available_in`,
//! `clear_rate_limit`. Nothing above this layer talks to C1–C4 directly.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use std::sync::Arc;
  use chrono::{ Duration as ChronoDuration, Utc };
  use serde_json::Value;

  use crate::cache_key::generate_cache_key;
  use crate::rate_limit::{ RateLimitStore, RateLimiter, RateLimiterConfig, InMemoryRateLimitStore };
  use crate::storage::
  {
    CacheEntry, CacheStorage, CachedResult, ErrorLogEntry, InMemoryCacheStorage,
    StoreResponseInput, get_cached_response,
  };

  /// Hook allowing a caller to decline caching a successful response
  ///
  /// Default accepts everything; a subclass-equivalent can decline, e.g.
  /// when every sub-task in a batched response errored despite HTTP 200.
  pub trait ShouldCache : Send + Sync
  {
    /// Inspect the decompressed response body and decide whether to cache it
    fn should_cache( &self, response_body : &[ u8 ] ) -> bool;
  }

  /// Default policy: always cache
  #[ derive( Debug, Clone, Copy, Default ) ]
  pub struct AlwaysCache;

  impl ShouldCache for AlwaysCache
  {
    fn should_cache( &self, _response_body : &[ u8 ] ) -> bool
    {
      true
    }
  }

  /// Composes C1–C4 and C2 behind the single surface a client depends on
  #[ derive( Debug, Clone ) ]
  pub struct CacheManager
  {
    client : String,
    storage : Arc< dyn CacheStorage >,
    rate_limiter : RateLimiter,
    version : String,
    compression_enabled : bool,
  }

  impl CacheManager
  {
    /// Build a manager for one client, over explicit storage and rate-limit stores
    #[ must_use ]
    pub fn new
    (
      client : impl Into< String >,
      version : impl Into< String >,
      compression_enabled : bool,
      rate_limit_config : RateLimiterConfig,
      storage : Arc< dyn CacheStorage >,
      rate_limit_store : Arc< dyn RateLimitStore >,
    ) -> Self
    {
      let client = client.into();
      Self
      {
        rate_limiter : RateLimiter::new( client.clone(), rate_limit_config, rate_limit_store ),
        client,
        storage,
        version : version.into(),
        compression_enabled,
      }
    }

    /// Convenience constructor over the in-memory default stores
    #[ must_use ]
    pub fn with_in_memory_stores
    (
      client : impl Into< String >,
      version : impl Into< String >,
      compression_enabled : bool,
      rate_limit_config : RateLimiterConfig,
    ) -> Self
    {
      Self::new
      (
        client,
        version,
        compression_enabled,
        rate_limit_config,
        Arc::new( InMemoryCacheStorage::new() ),
        Arc::new( InMemoryRateLimitStore::new() ),
      )
    }

    /// C3: build the deterministic cache key for one call
    #[ must_use ]
    pub fn generate_cache_key( &self, endpoint : &str, params : &Value, method : &str ) -> String
    {
      generate_cache_key( &self.client, endpoint, params, method, &self.version )
    }

    /// C4 + C1: look up a non-expired cached response, transparently
    /// decompressing the stored body.
    #[ must_use ]
    pub fn get_cached_response( &self, key : &str ) -> Option< CachedResult >
    {
      get_cached_response( &self.storage, &self.client, key )
    }

    /// C4 + C1: store a response, compressing the body if this client has
    /// compression enabled. Compression is governed entirely by the
    /// manager's own `compression_enabled` flag, not by anything in
    /// `input` — there is no per-call override. Returns `false` without
    /// writing when `should_cache` declines the body.
    pub fn store_response
    (
      &self,
      key : &str,
      input : StoreResponseInput,
      should_cache : &dyn ShouldCache,
    ) -> bool
    {
      if !should_cache.should_cache( &input.response_body )
      {
        return false;
      }

      #[ cfg( feature = "compression" ) ]
      let stored_body = match crate::compression::compress( self.compression_enabled, &crate::compression::CompressionConfig::new(), &input.response_body )
      {
        Ok( bytes ) => bytes,
        Err( _ ) => input.response_body.clone(),
      };
      #[ cfg( not( feature = "compression" ) ) ]
      let stored_body = input.response_body.clone();

      let now = Utc::now();
      let expires_at = input.ttl.map( | ttl | now + ChronoDuration::seconds( ttl ) );

      let entry = CacheEntry
      {
        key : key.to_string(),
        client : self.client.clone(),
        endpoint : input.endpoint,
        method : input.method,
        base_url : input.base_url,
        full_url : input.full_url,
        version : input.version,
        attributes : input.attributes.0,
        attributes2 : input.attributes.1,
        attributes3 : input.attributes.2,
        credits : input.credits,
        cost : input.cost,
        request_headers : input.request_headers,
        request_body : input.request_body,
        response_headers : input.response_headers,
        response_body : stored_body,
        response_status_code : input.response_status_code,
        response_size : input.response_body.len(),
        response_time : input.response_time,
        expires_at,
        compressed : self.compression_enabled,
        processed_at : None,
        processed_status : None,
        created_at : now,
        updated_at : now,
      };

      self.storage.put( &self.client, key, entry );
      true
    }

    /// Append an error-log row for this client
    pub fn log_error( &self, entry : ErrorLogEntry )
    {
      self.storage.log_error( entry );
    }

    /// C2: true iff a request may proceed right now
    #[ must_use ]
    pub fn allow_request( &self ) -> bool
    {
      self.rate_limiter.allow_request()
    }

    /// C2: atomically reserve `amount` credits
    pub fn increment_attempts( &self, amount : u64 )
    {
      self.rate_limiter.increment_attempts( amount );
    }

    /// C2: attempts remaining in the current window
    #[ must_use ]
    pub fn remaining_attempts( &self ) -> u64
    {
      self.rate_limiter.remaining_attempts()
    }

    /// C2: seconds until the window resets
    #[ must_use ]
    pub fn available_in( &self ) -> u64
    {
      self.rate_limiter.available_in()
    }

    /// C2: delete this client's rate-limit bucket
    pub fn clear_rate_limit( &self )
    {
      self.rate_limiter.clear();
    }

    /// Underlying storage, exposed for processors (C8) that need to scan
    /// and update rows beyond the façade's cache/store surface.
    #[ must_use ]
    pub fn storage( &self ) -> &Arc< dyn CacheStorage >
    {
      &self.storage
    }

    /// Client name this manager is scoped to
    #[ must_use ]
    pub fn client( &self ) -> &str
    {
      &self.client
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn sample_input() -> StoreResponseInput
    {
      StoreResponseInput
      {
        endpoint : "/v1/widgets".to_string(),
        method : "GET".to_string(),
        base_url : "https://api.example.com".to_string(),
        full_url : "https://api.example.com/v1/widgets".to_string(),
        version : Some( "v1".to_string() ),
        attributes : ( None, None, None ),
        credits : 1,
        cost : None,
        request_headers : Vec::new(),
        request_body : Vec::new(),
        response_headers : Vec::new(),
        response_body : b"{\"ok\":true}".to_vec(),
        response_status_code : 200,
        response_time : 0.05,
        ttl : Some( 3600 ),
      }
    }

    #[ test ]
    fn store_then_hit_round_trips()
    {
      let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, RateLimiterConfig::new() );
      let key = manager.generate_cache_key( "/v1/widgets", &serde_json::json!( {} ), "GET" );
      assert!( manager.get_cached_response( &key ).is_none() );

      manager.store_response( &key, sample_input(), &AlwaysCache );

      let hit = manager.get_cached_response( &key ).unwrap();
      assert!( hit.is_cached );
      assert_eq!( hit.response.body, b"{\"ok\":true}" );
    }

    #[ test ]
    fn should_cache_hook_can_decline()
    {
      struct NeverCache;
      impl ShouldCache for NeverCache
      {
        fn should_cache( &self, _ : &[ u8 ] ) -> bool { false }
      }

      let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, RateLimiterConfig::new() );
      let key = manager.generate_cache_key( "/v1/widgets", &serde_json::json!( {} ), "GET" );
      let stored = manager.store_response( &key, sample_input(), &NeverCache );
      assert!( !stored );
      assert!( manager.get_cached_response( &key ).is_none() );
    }

    #[ test ]
    fn rate_limit_surface_delegates_to_c2()
    {
      let config = RateLimiterConfig::with_explicit_config( Some( 1 ), 60 );
      let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, config );
      assert!( manager.allow_request() );
      manager.increment_attempts( 1 );
      assert!( !manager.allow_request() );
      manager.clear_rate_limit();
      assert!( manager.allow_request() );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    CacheManager,
    ShouldCache,
    AlwaysCache,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
