//! Error taxonomy for the cache gateway core
//!
//! Mirrors the failure semantics table in the specification: network
//! failures surface raw, provider HTTP errors are returned and logged,
//! rate-limit refusals carry the retry hint, decompression/processing
//! failures degrade to a miss or a per-row error status rather than
//! aborting the caller, and a caller-cancelled dispatch surfaces as
//! `Cancelled` rather than a network failure.

mod private
{
  use std::fmt;

  /// Result type for cache-gateway operations
  pub type ApiCacheResult< T > = core::result::Result< T, ApiCacheError >;

  /// Errors produced by the cache gateway core
  #[ derive( Debug, Clone ) ]
  pub enum ApiCacheError
  {
    /// A caller-supplied argument failed validation before any I/O happened
    InvalidArgument( String ),
    /// The rate-limit bucket for a client has no credits left
    RateLimitExceeded
    {
      /// Client the bucket belongs to
      client : String,
      /// Seconds until the bucket has capacity again
      available_in : u64,
    },
    /// The upstream HTTP call returned a status code ≥ 400
    HttpStatus
    {
      /// Status code returned by the upstream
      status : u16,
      /// Raw response body, preserved for the caller
      body : Vec< u8 >,
      /// Vendor-extracted human-readable detail, if any
      api_message : Option< String >,
    },
    /// Transport-level failure (DNS, connect, timeout) — no cache/credit impact
    Network( String ),
    /// A dispatch exceeded its configured timeout
    Timeout( std::time::Duration ),
    /// A caller-supplied cancellation signal aborted the dispatch before
    /// (or while) it was in flight; no cache/credit impact
    Cancelled( String ),
    /// Stored bytes could not be decompressed; caller should treat as a miss
    Decompression( String ),
    /// A processor failed to parse or extract a stored response
    Processing( String ),
    /// Serialization/deserialization failure
    Serde( String ),
    /// Everything else (I/O, internal invariants)
    Internal( String ),
  }

  impl fmt::Display for ApiCacheError
  {
    fn fmt( &self, f : &mut fmt::Formatter< '_ > ) -> fmt::Result
    {
      match self
      {
        ApiCacheError::InvalidArgument( msg ) => write!( f, "invalid argument : {msg}" ),
        ApiCacheError::RateLimitExceeded { client, available_in } =>
          write!( f, "rate limit exceeded for '{client}', available again in {available_in}s" ),
        ApiCacheError::HttpStatus { status, api_message, .. } =>
        {
          match api_message
          {
            Some( msg ) => write!( f, "upstream returned HTTP {status} : {msg}" ),
            None => write!( f, "upstream returned HTTP {status}" ),
          }
        },
        ApiCacheError::Network( msg ) => write!( f, "network failure : {msg}" ),
        ApiCacheError::Timeout( d ) => write!( f, "request timed out after {:.1}s", d.as_secs_f64() ),
        ApiCacheError::Cancelled( msg ) => write!( f, "dispatch cancelled : {msg}" ),
        ApiCacheError::Decompression( msg ) => write!( f, "decompression failed : {msg}" ),
        ApiCacheError::Processing( msg ) => write!( f, "processing failed : {msg}" ),
        ApiCacheError::Serde( msg ) => write!( f, "serialization error : {msg}" ),
        ApiCacheError::Internal( msg ) => write!( f, "internal error : {msg}" ),
      }
    }
  }

  impl core::error::Error for ApiCacheError {}

  impl ApiCacheError
  {
    /// Whether this error kind ever consumes a rate-limit credit
    ///
    /// Per the failure-semantics table: network failures and timeouts
    /// never consume credits; everything that reached the upstream does.
    #[ must_use ]
    pub fn consumes_credit( &self ) -> bool
    {
      matches!( self, ApiCacheError::HttpStatus { .. } )
    }
  }

  #[ cfg( feature = "enabled" ) ]
  impl From< reqwest::Error > for ApiCacheError
  {
    fn from( error : reqwest::Error ) -> Self
    {
      if error.is_timeout()
      {
        ApiCacheError::Timeout( std::time::Duration::from_secs( 0 ) )
      }
      else
      {
        ApiCacheError::Network( error.to_string() )
      }
    }
  }

  impl From< serde_json::Error > for ApiCacheError
  {
    fn from( error : serde_json::Error ) -> Self
    {
      ApiCacheError::Serde( error.to_string() )
    }
  }
}

crate::mod_interface!
{
  exposed use ApiCacheError;
  exposed use ApiCacheResult;
}
