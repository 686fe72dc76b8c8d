//! Per-client response storage and the shared error log (C4)
//!
//! Backed by the `CacheStorage` trait so the gateway core stays agnostic
//! to whether rows live in one shared table, one table per client, or a
//! remote database — the in-memory default is a faithful implementation
//! of the contract, not the only legal one.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use std::collections::HashMap;
  use std::sync::Arc;
  use chrono::{ DateTime, Utc };
  use dashmap::DashMap;
  use parking_lot::Mutex;
  use serde_json::Value;

  /// One stored cache row (`Cache entry` in the data model)
  #[ derive( Debug, Clone ) ]
  pub struct CacheEntry
  {
    /// 64-hex cache key
    pub key : String,
    /// Owning client
    pub client : String,
    /// Endpoint path the request targeted
    pub endpoint : String,
    /// HTTP method used
    pub method : String,
    /// Base URL the client was configured with
    pub base_url : String,
    /// Fully composed URL actually dispatched
    pub full_url : String,
    /// API version segment, if any
    pub version : Option< String >,
    /// Free-form application-level tag
    pub attributes : Option< String >,
    /// Free-form application-level tag
    pub attributes2 : Option< String >,
    /// Free-form application-level tag
    pub attributes3 : Option< String >,
    /// Rate-limit credits reserved for this call
    pub credits : u64,
    /// Provider-reported cost, if any
    pub cost : Option< f64 >,
    /// Serialized request headers
    pub request_headers : Vec< u8 >,
    /// Raw (possibly compressed) request body
    pub request_body : Vec< u8 >,
    /// Serialized response headers
    pub response_headers : Vec< u8 >,
    /// Raw (possibly compressed) response body
    pub response_body : Vec< u8 >,
    /// HTTP status code returned
    pub response_status_code : u16,
    /// Size in bytes of the stored response body
    pub response_size : usize,
    /// Wall-clock seconds the dispatch took
    pub response_time : f64,
    /// Expiry; `None` means the row never expires
    pub expires_at : Option< DateTime< Utc > >,
    /// Whether the stored body was compressed at write time
    pub compressed : bool,
    /// Set once a processor has consumed this row
    pub processed_at : Option< DateTime< Utc > >,
    /// Outcome recorded by the processor that ran over this row
    pub processed_status : Option< Value >,
    /// Row creation time
    pub created_at : DateTime< Utc >,
    /// Row last-update time
    pub updated_at : DateTime< Utc >,
  }

  /// The decorated view returned to callers on a cache hit
  #[ derive( Debug, Clone ) ]
  pub struct CachedResult
  {
    /// Echo of the original request shape
    pub request : RequestView,
    /// The stored response, decompressed
    pub response : ResponseView,
    /// Size in bytes of the (decompressed) response body
    pub response_size : usize,
    /// Dispatch duration recorded at store time
    pub response_time : f64,
    /// Always `true` for rows returned by `get_cached_response`
    pub is_cached : bool,
    /// Row expiry, echoed for callers who want to display it
    pub expires_at : Option< DateTime< Utc > >,
  }

  /// Request half of a `CachedResult`
  #[ derive( Debug, Clone ) ]
  pub struct RequestView
  {
    /// Base URL used
    pub base_url : String,
    /// Full composed URL used
    pub full_url : String,
    /// HTTP method used
    pub method : String,
    /// Application-level tags
    pub attributes : ( Option< String >, Option< String >, Option< String > ),
    /// Credits reserved
    pub credits : u64,
    /// Provider-reported cost
    pub cost : Option< f64 >,
    /// Serialized headers sent
    pub headers : Vec< u8 >,
    /// Body sent
    pub body : Vec< u8 >,
  }

  /// Response half of a `CachedResult`
  #[ derive( Debug, Clone ) ]
  pub struct ResponseView
  {
    /// Serialized headers received
    pub headers : Vec< u8 >,
    /// Decompressed body received
    pub body : Vec< u8 >,
    /// HTTP status code
    pub status_code : u16,
  }

  /// Inputs to `store_response`, grouped to keep the trait method
  /// signature from growing unboundedly with the data model.
  #[ derive( Debug, Clone ) ]
  pub struct StoreResponseInput
  {
    /// Endpoint path the request targeted
    pub endpoint : String,
    /// HTTP method used
    pub method : String,
    /// Base URL the client was configured with
    pub base_url : String,
    /// Fully composed URL dispatched
    pub full_url : String,
    /// API version segment, if any
    pub version : Option< String >,
    /// Free-form application-level tags
    pub attributes : ( Option< String >, Option< String >, Option< String > ),
    /// Rate-limit credits reserved for this call
    pub credits : u64,
    /// Provider-reported cost, if any
    pub cost : Option< f64 >,
    /// Serialized request headers
    pub request_headers : Vec< u8 >,
    /// Request body, already serialized
    pub request_body : Vec< u8 >,
    /// Serialized response headers
    pub response_headers : Vec< u8 >,
    /// Response body, decompressed form
    pub response_body : Vec< u8 >,
    /// HTTP status code returned
    pub response_status_code : u16,
    /// Wall-clock seconds the dispatch took
    pub response_time : f64,
    /// Optional time-to-live in seconds
    pub ttl : Option< i64 >,
  }

  /// One append-only row in the shared error log
  #[ derive( Debug, Clone ) ]
  pub struct ErrorLogEntry
  {
    /// Client the error occurred under
    pub api_client : String,
    /// Coarse error classification
    pub error_type : ErrorType,
    /// Human-readable summary
    pub error_message : String,
    /// Vendor-extracted detail, if any
    pub api_message : Option< String >,
    /// Structured context (status code, endpoint, redacted request excerpt)
    pub context_data : Value,
    /// Row creation time
    pub created_at : DateTime< Utc >,
  }

  /// Error-log classification (spec §3 Error log entry)
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize ) ]
  #[ serde( rename_all = "snake_case" ) ]
  pub enum ErrorType
  {
    /// Upstream returned a non-2xx HTTP status
    HttpError,
    /// A cached row was rejected at read time (e.g. decompression failure)
    CacheRejected,
    /// A processor failed to extract entities from a response
    ProcessingError,
  }

  /// Storage contract for per-client cached responses and the error log
  pub trait CacheStorage : Send + Sync + std::fmt::Debug
  {
    /// Look up a non-expired row by `(client, key)`. Expired rows
    /// (`expires_at` in the past) return `None` without being deleted.
    fn get( &self, client : &str, key : &str ) -> Option< CacheEntry >;

    /// Insert or update the `(client, key)` row
    fn put( &self, client : &str, key : &str, entry : CacheEntry );

    /// Append a row to the shared error log
    fn log_error( &self, entry : ErrorLogEntry );

    /// Drain the error log, for diagnostics / tests
    fn errors( &self, client : &str ) -> Vec< ErrorLogEntry >;

    /// All rows for a client, for processors to scan
    fn rows_for_client( &self, client : &str ) -> Vec< CacheEntry >;

    /// Persist a row mutated in place by a processor
    fn update( &self, client : &str, key : &str, entry : CacheEntry );
  }

  /// Default in-process store, one `DashMap` per client keyed by cache key
  #[ derive( Debug, Default ) ]
  pub struct InMemoryCacheStorage
  {
    rows : DashMap< String, DashMap< String, CacheEntry > >,
    errors : Mutex< HashMap< String, Vec< ErrorLogEntry > > >,
  }

  impl InMemoryCacheStorage
  {
    /// Create an empty store
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }
  }

  impl CacheStorage for InMemoryCacheStorage
  {
    fn get( &self, client : &str, key : &str ) -> Option< CacheEntry >
    {
      let table = self.rows.get( client )?;
      let entry = table.get( key )?;
      if let Some( expires_at ) = entry.expires_at
      {
        if expires_at < Utc::now()
        {
          return None;
        }
      }
      Some( entry.clone() )
    }

    fn put( &self, client : &str, key : &str, entry : CacheEntry )
    {
      self.rows.entry( client.to_string() ).or_default().insert( key.to_string(), entry );
    }

    fn log_error( &self, entry : ErrorLogEntry )
    {
      self.errors.lock().entry( entry.api_client.clone() ).or_default().push( entry );
    }

    fn errors( &self, client : &str ) -> Vec< ErrorLogEntry >
    {
      self.errors.lock().get( client ).cloned().unwrap_or_default()
    }

    fn rows_for_client( &self, client : &str ) -> Vec< CacheEntry >
    {
      self.rows.get( client ).map( | table | table.iter().map( | r | r.value().clone() ).collect() ).unwrap_or_default()
    }

    fn update( &self, client : &str, key : &str, entry : CacheEntry )
    {
      self.put( client, key, entry );
    }
  }

  /// Redact a header block's `Authorization` line before it is logged
  ///
  /// Headers are stored as newline-separated `Name: value` text; any line
  /// whose name case-insensitively matches `authorization` has its value
  /// replaced.
  #[ must_use ]
  pub fn redact_authorization_header( headers : &[ u8 ] ) -> Vec< u8 >
  {
    let text = String::from_utf8_lossy( headers );
    let redacted : Vec< String > = text
      .lines()
      .map( | line |
      {
        if let Some( ( name, _ ) ) = line.split_once( ':' )
        {
          if name.trim().eq_ignore_ascii_case( "authorization" )
          {
            return format!( "{name}: [REDACTED]" );
          }
        }
        line.to_string()
      } )
      .collect();
    redacted.join( "\n" ).into_bytes()
  }

  /// Build an `ErrorLogEntry`, always redacting the `Authorization` header
  /// inside `context_data.request_headers` if present.
  #[ must_use ]
  pub fn build_error_log_entry
  (
    api_client : &str,
    error_type : ErrorType,
    error_message : impl Into< String >,
    api_message : Option< String >,
    mut context_data : Value,
  ) -> ErrorLogEntry
  {
    if let Some( headers ) = context_data.get( "request_headers" ).and_then( Value::as_str )
    {
      let redacted = redact_authorization_header( headers.as_bytes() );
      if let Value::Object( map ) = &mut context_data
      {
        map.insert( "request_headers".to_string(), Value::String( String::from_utf8_lossy( &redacted ).into_owned() ) );
      }
    }

    ErrorLogEntry
    {
      api_client : api_client.to_string(),
      error_type,
      error_message : error_message.into(),
      api_message,
      context_data,
      created_at : Utc::now(),
    }
  }

  fn to_cached_result( entry : &CacheEntry, body : Vec< u8 > ) -> CachedResult
  {
    CachedResult
    {
      request : RequestView
      {
        base_url : entry.base_url.clone(),
        full_url : entry.full_url.clone(),
        method : entry.method.clone(),
        attributes : ( entry.attributes.clone(), entry.attributes2.clone(), entry.attributes3.clone() ),
        credits : entry.credits,
        cost : entry.cost,
        headers : entry.request_headers.clone(),
        body : entry.request_body.clone(),
      },
      response : ResponseView
      {
        headers : entry.response_headers.clone(),
        body,
        status_code : entry.response_status_code,
      },
      response_size : entry.response_size,
      response_time : entry.response_time,
      is_cached : true,
      expires_at : entry.expires_at,
    }
  }

  /// Read a cached response, decompressing its body through C1 and
  /// treating decompression failures as a miss (logged `cache_rejected`).
  #[ must_use ]
  pub fn get_cached_response
  (
    storage : &Arc< dyn CacheStorage >,
    client : &str,
    key : &str,
  ) -> Option< CachedResult >
  {
    let entry = storage.get( client, key )?;

    #[ cfg( feature = "compression" ) ]
    let decompressed = crate::compression::decompress( entry.compressed, &entry.response_body );
    #[ cfg( not( feature = "compression" ) ) ]
    let decompressed : Result< Vec< u8 >, () > = Ok( entry.response_body.clone() );

    match decompressed
    {
      Ok( body ) => Some( to_cached_result( &entry, body ) ),
      Err( err ) =>
      {
        #[ cfg( feature = "compression" ) ]
        storage.log_error
        (
          build_error_log_entry
          (
            client,
            ErrorType::CacheRejected,
            err.to_string(),
            None,
            serde_json::json!( { "key" : key, "endpoint" : entry.endpoint } ),
          )
        );
        None
      },
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn sample_entry( client : &str, key : &str ) -> CacheEntry
    {
      CacheEntry
      {
        key : key.to_string(),
        client : client.to_string(),
        endpoint : "/v1/widgets".to_string(),
        method : "GET".to_string(),
        base_url : "https://api.example.com".to_string(),
        full_url : "https://api.example.com/v1/widgets".to_string(),
        version : Some( "v1".to_string() ),
        attributes : None,
        attributes2 : None,
        attributes3 : None,
        credits : 1,
        cost : None,
        request_headers : Vec::new(),
        request_body : Vec::new(),
        response_headers : Vec::new(),
        response_body : b"hello".to_vec(),
        response_status_code : 200,
        response_size : 5,
        response_time : 0.1,
        expires_at : Some( Utc::now() + chrono::Duration::seconds( 60 ) ),
        compressed : false,
        processed_at : None,
        processed_status : None,
        created_at : Utc::now(),
        updated_at : Utc::now(),
      }
    }

    #[ test ]
    fn put_then_get_round_trips()
    {
      let storage = InMemoryCacheStorage::new();
      storage.put( "acme", "k1", sample_entry( "acme", "k1" ) );
      let found = storage.get( "acme", "k1" );
      assert!( found.is_some() );
      assert_eq!( found.unwrap().response_body, b"hello" );
    }

    #[ test ]
    fn expired_row_reads_as_absent()
    {
      let storage = InMemoryCacheStorage::new();
      let mut entry = sample_entry( "acme", "k1" );
      entry.expires_at = Some( Utc::now() - chrono::Duration::seconds( 1 ) );
      storage.put( "acme", "k1", entry );
      assert!( storage.get( "acme", "k1" ).is_none() );
    }

    #[ test ]
    fn redacts_authorization_header()
    {
      let headers = b"Content-Type: application/json\nAuthorization: Bearer sk-secret-123\n";
      let redacted = redact_authorization_header( headers );
      let text = String::from_utf8( redacted ).unwrap();
      assert!( text.contains( "[REDACTED]" ) );
      assert!( !text.contains( "sk-secret-123" ) );
      assert!( text.contains( "Content-Type: application/json" ) );
    }

    #[ test ]
    fn different_clients_are_isolated()
    {
      let storage = InMemoryCacheStorage::new();
      storage.put( "acme", "k1", sample_entry( "acme", "k1" ) );
      assert!( storage.get( "other", "k1" ).is_none() );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    CacheEntry,
    CachedResult,
    RequestView,
    ResponseView,
    StoreResponseInput,
    ErrorLogEntry,
    ErrorType,
    CacheStorage,
    InMemoryCacheStorage,
    redact_authorization_header,
    build_error_log_entry,
    get_cached_response,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
