//! Types shared by the base client: job/result shapes and the
//! per-client capability hooks (§9 "dynamic method dispatch" redesign).

mod private
{
  use std::collections::HashMap;
  use std::sync::Arc;
  use serde_json::Value;
  use tokio::sync::watch;
  use crate::error::ApiCacheError;
  use crate::storage::{ ErrorLogEntry, ErrorType, build_error_log_entry };

  /// One call to dispatch through `send_cached_request`
  #[ derive( Debug, Clone ) ]
  pub struct RequestJob
  {
    /// Endpoint path, relative to the client's base URL (+ version)
    pub endpoint : String,
    /// Call parameters; become the JSON body (POST) or query string (GET)
    pub params : Value,
    /// HTTP method
    pub method : HttpMethod,
    /// Free-form application tags, not part of the cache key
    pub attributes : ( Option< String >, Option< String >, Option< String > ),
    /// Rate-limit credits this call reserves
    pub amount : u64,
    /// Whether to consult the cache before dispatching
    pub use_cache : bool,
    /// Cache entry time-to-live in seconds, if this call produces a fresh row
    pub ttl : Option< i64 >,
  }

  impl RequestJob
  {
    /// Build a job with the spec's defaults: `attributes={}`, `amount=1`,
    /// cache consulted.
    #[ must_use ]
    pub fn new( endpoint : impl Into< String >, params : Value, method : HttpMethod ) -> Self
    {
      Self
      {
        endpoint : endpoint.into(),
        params,
        method,
        attributes : ( None, None, None ),
        amount : 1,
        use_cache : true,
        ttl : None,
      }
    }

    /// Attach application-level tags
    #[ must_use ]
    pub fn with_attributes( mut self, attributes : ( Option< String >, Option< String >, Option< String > ) ) -> Self
    {
      self.attributes = attributes;
      self
    }

    /// Override the rate-limit credit amount this call reserves
    #[ must_use ]
    pub fn with_amount( mut self, amount : u64 ) -> Self
    {
      self.amount = amount;
      self
    }

    /// Disable cache lookup for this call (rate-limit and dispatch still apply)
    #[ must_use ]
    pub fn without_cache( mut self ) -> Self
    {
      self.use_cache = false;
      self
    }

    /// Set the cache entry TTL for this call, in seconds
    #[ must_use ]
    pub fn with_ttl( mut self, ttl_seconds : i64 ) -> Self
    {
      self.ttl = Some( ttl_seconds );
      self
    }
  }

  /// Supported upstream HTTP methods
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum HttpMethod
  {
    /// GET — params serialize to a query string
    Get,
    /// POST — params serialize to a JSON body
    Post,
  }

  impl HttpMethod
  {
    /// Lowercase wire name, used in the canonical cache-key string
    #[ must_use ]
    pub fn as_str( self ) -> &'static str
    {
      match self
      {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
      }
    }
  }

  /// Uniform result handed back to callers, cached or freshly dispatched
  #[ derive( Debug, Clone ) ]
  pub struct DispatchResult
  {
    /// Full URL that was (or would have been) dispatched
    pub full_url : String,
    /// Response headers, serialized
    pub response_headers : Vec< u8 >,
    /// Decompressed response body
    pub response_body : Vec< u8 >,
    /// HTTP status code; `0` when the call never reached the upstream
    pub response_status_code : u16,
    /// Size in bytes of `response_body`
    pub response_size : usize,
    /// Wall-clock seconds the dispatch took; `0.0` for cache hits
    pub response_time : f64,
    /// Whether this result came from the cache
    pub is_cached : bool,
  }

  /// Per-client overrides of the base client's default behavior
  ///
  /// The base client never downcasts or duck-types a client subclass; it
  /// calls these four hook points, each with a documented default.
  pub trait ClientHooks : Send + Sync
  {
    /// Headers to attach to every dispatch (commonly the auth header)
    fn auth_headers( &self ) -> HashMap< String, String >;

    /// Query/body parameters merged into every dispatch (default: none)
    fn auth_params( &self ) -> HashMap< String, String >
    {
      HashMap::new()
    }

    /// Whether a successful response body should be cached
    ///
    /// Default accepts everything; a client may decline e.g. when every
    /// sub-task in a batched response errored despite an HTTP 200.
    fn should_cache( &self, _response_body : &[ u8 ] ) -> bool
    {
      true
    }

    /// Extract a provider-reported cost from a response body, if any
    fn calculate_cost( &self, _response_body : &[ u8 ] ) -> Option< f64 >
    {
      None
    }

    /// Extract the provider's reported credit consumption from a response
    /// body; defaults to the `amount` the job reserved.
    fn calculate_credits( &self, _response_body : &[ u8 ], reserved_amount : u64 ) -> u64
    {
      reserved_amount
    }

    /// Build an error-log row for a non-2xx response; the default logs the
    /// status and a truncated body excerpt with no vendor-specific detail.
    fn log_http_error
    (
      &self,
      client : &str,
      status : u16,
      endpoint : &str,
      response_body : &[ u8 ],
    ) -> ErrorLogEntry
    {
      let excerpt : String = String::from_utf8_lossy( response_body ).chars().take( 500 ).collect();
      let api_message = serde_json::from_slice::< Value >( response_body )
        .ok()
        .and_then( | value | value.get( "detail" ).and_then( Value::as_str ).map( str::to_string ) );

      build_error_log_entry
      (
        client,
        ErrorType::HttpError,
        format!( "upstream returned HTTP {status}" ),
        api_message,
        serde_json::json!( { "status" : status, "endpoint" : endpoint, "body_excerpt" : excerpt } ),
      )
    }
  }

  /// Hooks a client can use when it has nothing to override beyond auth
  #[ derive( Debug, Clone ) ]
  pub struct ApiKeyHooks
  {
    header_value : String,
  }

  impl ApiKeyHooks
  {
    /// Build hooks that attach a single `Authorization` header
    #[ must_use ]
    pub fn new( header_value : impl Into< String > ) -> Self
    {
      Self { header_value : header_value.into() }
    }
  }

  impl ClientHooks for ApiKeyHooks
  {
    fn auth_headers( &self ) -> HashMap< String, String >
    {
      let mut headers = HashMap::new();
      headers.insert( "Authorization".to_string(), self.header_value.clone() );
      headers
    }
  }

  /// Classifies why a dispatch failed, for the failure-semantics table
  #[ derive( Debug ) ]
  pub enum DispatchError
  {
    /// C2 refused the call before dispatch
    RateLimited( ApiCacheError ),
    /// Transport-level failure; no cache/credit impact
    Network( ApiCacheError ),
    /// A caller-supplied `CancellationToken` aborted the dispatch
    Cancelled( ApiCacheError ),
  }

  impl From< DispatchError > for ApiCacheError
  {
    fn from( error : DispatchError ) -> Self
    {
      match error
      {
        DispatchError::RateLimited( e ) | DispatchError::Network( e ) | DispatchError::Cancelled( e ) => e,
      }
    }
  }

  /// Caller-supplied signal that aborts outstanding jobs in a parallel
  /// dispatch (spec §4.6.2 cancellation contract)
  ///
  /// Built explicitly and passed in per call, like every other dependency
  /// in this crate — there is no ambient/global cancellation source.
  /// Cloning shares the same underlying signal.
  #[ derive( Debug, Clone ) ]
  pub struct CancellationToken
  {
    tx : Arc< watch::Sender< bool > >,
    rx : watch::Receiver< bool >,
  }

  impl CancellationToken
  {
    /// Create a token that is not yet cancelled
    #[ must_use ]
    pub fn new() -> Self
    {
      let ( tx, rx ) = watch::channel( false );
      Self { tx : Arc::new( tx ), rx }
    }

    /// Signal cancellation to every outstanding job racing `cancelled()`
    pub fn cancel( &self )
    {
      let _ = self.tx.send( true );
    }

    /// True once `cancel` has been called
    #[ must_use ]
    pub fn is_cancelled( &self ) -> bool
    {
      *self.rx.borrow()
    }

    /// Resolves once the token is cancelled; resolves immediately if it
    /// already was.
    pub async fn cancelled( &self )
    {
      let mut rx = self.rx.clone();
      if *rx.borrow()
      {
        return;
      }
      let _ = rx.changed().await;
    }
  }

  impl Default for CancellationToken
  {
    fn default() -> Self
    {
      Self::new()
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    RequestJob,
    HttpMethod,
    DispatchResult,
    ClientHooks,
    ApiKeyHooks,
    DispatchError,
    CancellationToken,
  };
}
