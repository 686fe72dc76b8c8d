//! End-to-end scenarios from the gateway's testable-properties list.
//!
//! These exercise the cache/rate-limit/storage/processor stack directly
//! against the in-memory default backends; they do not depend on a live
//! upstream, matching the swappable-storage design of C2/C4.

pub use api_cache as the_module;

use the_module::{ CacheManager, RateLimiterConfig };
use the_module::cache_manager::AlwaysCache;
use the_module::storage::StoreResponseInput;

fn sample_store_input( body : &[ u8 ] ) -> StoreResponseInput
{
  StoreResponseInput
  {
    endpoint : "/v1/search".to_string(),
    method : "POST".to_string(),
    base_url : "https://api.example.com".to_string(),
    full_url : "https://api.example.com/v1/search".to_string(),
    version : Some( "v1".to_string() ),
    attributes : ( None, None, None ),
    credits : 1,
    cost : None,
    request_headers : Vec::new(),
    request_body : Vec::new(),
    response_headers : Vec::new(),
    response_body : body.to_vec(),
    response_status_code : 200,
    response_time : 0.02,
    ttl : Some( 3600 ),
  }
}

/// S1 — cache hit: storing once then reading twice yields `is_cached=false`
/// behavior only on the miss path; a second lookup at the same key hits.
#[ test ]
fn s1_cache_hit_on_second_lookup()
{
  let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, RateLimiterConfig::new() );
  let key = manager.generate_cache_key( "/v1/search", &serde_json::json!( { "q" : "cats" } ), "POST" );

  assert!( manager.get_cached_response( &key ).is_none() );

  manager.store_response( &key, sample_store_input( b"{\"results\":[]}" ), &AlwaysCache );

  let first = manager.get_cached_response( &key ).unwrap();
  assert!( first.is_cached );
  let second = manager.get_cached_response( &key ).unwrap();
  assert!( second.is_cached );
  assert_eq!( second.response.body, b"{\"results\":[]}" );
}

/// S2 — rate limit: after exactly `max_attempts` consuming calls, the next
/// is refused with a positive `available_in`.
#[ test ]
fn s2_rate_limit_exhausts_after_max_attempts()
{
  let config = RateLimiterConfig::with_explicit_config( Some( 5 ), 10 );
  let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, config );

  for _ in 0..5
  {
    assert!( manager.allow_request() );
    manager.increment_attempts( 1 );
  }

  assert!( !manager.allow_request() );
  assert!( manager.available_in() > 0 );

  manager.clear_rate_limit();
  assert_eq!( manager.remaining_attempts(), 5 );
}

/// S3 — compression round-trip through the manager's store/read path.
#[ test ]
#[ cfg( feature = "compression" ) ]
fn s3_compression_round_trip_through_manager()
{
  let manager = CacheManager::with_in_memory_stores( "acme", "v1", true, RateLimiterConfig::new() );
  let key = manager.generate_cache_key( "/v1/search", &serde_json::json!( { "q" : "dogs" } ), "POST" );

  let body = "Hello, world!".repeat( 1000 ).into_bytes();
  manager.store_response( &key, sample_store_input( &body ), &AlwaysCache );

  let hit = manager.get_cached_response( &key ).unwrap();
  assert_eq!( hit.response.body, body );
}

/// S4 — provider error logging: a 400 response with a `detail` field is
/// logged with the extracted `api_message`.
#[ test ]
fn s4_http_error_logs_extracted_detail()
{
  use the_module::client::ClientHooks;
  use the_module::storage::{ ErrorType, ErrorLogEntry, build_error_log_entry };

  struct DefaultHooks;
  impl ClientHooks for DefaultHooks
  {
    fn auth_headers( &self ) -> std::collections::HashMap< String, String >
    {
      std::collections::HashMap::new()
    }
  }

  let manager = CacheManager::with_in_memory_stores( "acme", "v1", false, RateLimiterConfig::new() );
  let hooks = DefaultHooks;
  let body = br#"{"detail":"Invalid URL"}"#;

  let entry : ErrorLogEntry = hooks.log_http_error( "acme", 400, "/v1/search", body );
  assert_eq!( entry.error_type, ErrorType::HttpError );
  assert_eq!( entry.api_message.as_deref(), Some( "Invalid URL" ) );

  manager.log_error( entry );
  let logged = manager.storage().errors( "acme" );
  assert_eq!( logged.len(), 1 );
  assert_eq!( logged[ 0 ].api_message.as_deref(), Some( "Invalid URL" ) );

  // malformed body leaves api_message null, not an error
  let malformed = build_error_log_entry( "acme", ErrorType::HttpError, "bad", None, serde_json::json!( {} ) );
  assert!( malformed.api_message.is_none() );
}

/// S5 — processor run: seed one unprocessed response with 2 items, run
/// once, expect 2 destination rows and OK status; re-run yields nothing new.
#[ test ]
fn s5_processor_run_is_idempotent()
{
  use std::sync::Arc;
  use parking_lot::Mutex;
  use serde_json::Value;
  use the_module::processor::{ ExtractedEntity, Processor, ProcessorPolicy, ProcessorRunner };
  use the_module::storage::InMemoryCacheStorage;

  struct ItemProcessor
  {
    destination : Mutex< Vec< Value > >,
  }

  impl Processor for ItemProcessor
  {
    fn endpoint_pattern( &self ) -> &str
    {
      "/v1/serp"
    }

    fn extract( &self, response_body : &[ u8 ], _policy : ProcessorPolicy ) -> Result< Vec< ExtractedEntity >, String >
    {
      let value : Value = serde_json::from_slice( response_body ).map_err( | e | e.to_string() )?;
      let items = value.get( "items" ).and_then( Value::as_array ).ok_or_else( || "missing items".to_string() )?;
      Ok( items.iter().map( | item | ExtractedEntity { natural_key : item.clone(), payload : item.clone() } ).collect() )
    }

    fn upsert( &self, entity : &ExtractedEntity, _response_id : &str, _policy : ProcessorPolicy ) -> bool
    {
      self.destination.lock().push( entity.payload.clone() );
      true
    }

    fn clear_destination_tables( &self, with_count : bool ) -> Option< u64 >
    {
      let mut dest = self.destination.lock();
      let count = dest.len();
      dest.clear();
      with_count.then_some( count as u64 )
    }
  }

  let storage = Arc::new( InMemoryCacheStorage::new() );
  let manager = CacheManager::new
  (
    "acme", "v1", false,
    RateLimiterConfig::new(),
    storage.clone(),
    Arc::new( the_module::rate_limit::InMemoryRateLimitStore::new() ),
  );

  let key = manager.generate_cache_key( "/v1/serp", &serde_json::json!( { "q" : "x" } ), "GET" );
  let input = StoreResponseInput
  {
    endpoint : "/v1/serp".to_string(),
    response_body : br#"{"items":[{"a":1},{"a":2}]}"#.to_vec(),
    ..sample_store_input( b"" )
  };
  manager.store_response( &key, input, &AlwaysCache );

  let processor = Arc::new( ItemProcessor { destination : Mutex::new( Vec::new() ) } );
  let runner = ProcessorRunner::new( "acme", storage, processor );

  let stats = runner.process_responses( 10 );
  assert_eq!( stats.processed_ok, 1 );
  assert_eq!( stats.entities_upserted, 2 );

  let rerun = runner.process_responses( 10 );
  assert_eq!( rerun.processed_ok, 0 );
  assert_eq!( rerun.entities_upserted, 0 );
}

/// S6 — parallel dispatch with partial cache: a cached job returns without
/// a live dispatch; over-capacity live jobs are refused before any dispatch.
#[ tokio::test ]
async fn s6_parallel_dispatch_respects_cache_and_capacity()
{
  use std::sync::Arc;
  use the_module::client::{ BaseClient, ClientHooks, HttpMethod, RequestJob };

  struct NoAuth;
  impl ClientHooks for NoAuth
  {
    fn auth_headers( &self ) -> std::collections::HashMap< String, String >
    {
      std::collections::HashMap::new()
    }
  }

  let config = RateLimiterConfig::with_explicit_config( Some( 5 ), 60 );
  let manager = Arc::new( CacheManager::with_in_memory_stores( "acme", "v1", false, config ) );

  let cached_job = RequestJob::new( "/v1/search", serde_json::json!( { "q" : "cached" } ), HttpMethod::Get );
  let key = manager.generate_cache_key( "/v1/search", &serde_json::json!( { "q" : "cached" } ), "GET" );
  manager.store_response( &key, sample_store_input( b"{\"ok\":true}" ), &AlwaysCache );

  let client = BaseClient::new( manager.clone() );

  // Three more live jobs than remaining attempts (5) should be refused
  // before any dispatch happens.
  let live_jobs : Vec< RequestJob > = ( 0..6 )
    .map( | i | RequestJob::new( "/v1/search", serde_json::json!( { "q" : format!( "live-{i}" ) } ), HttpMethod::Get ) )
    .collect();
  let mut jobs = vec![ cached_job ];
  jobs.extend( live_jobs );

  let result = client.send_cached_requests_parallel( &jobs, "https://api.example.com", None, &NoAuth, None, None ).await;
  assert!( result.is_err(), "6 live jobs against 5 remaining attempts must be refused up front" );
}

/// S7 — cancellation: a token cancelled before dispatch aborts every live
/// job while a cached hit in the same batch still returns normally.
#[ tokio::test ]
async fn s7_cancellation_aborts_live_jobs_but_not_cache_hits()
{
  use std::sync::Arc;
  use the_module::client::{ BaseClient, CancellationToken, ClientHooks, HttpMethod, RequestJob };

  struct NoAuth;
  impl ClientHooks for NoAuth
  {
    fn auth_headers( &self ) -> std::collections::HashMap< String, String >
    {
      std::collections::HashMap::new()
    }
  }

  let config = RateLimiterConfig::with_explicit_config( Some( 5 ), 60 );
  let manager = Arc::new( CacheManager::with_in_memory_stores( "acme", "v1", false, config ) );

  let cached_job = RequestJob::new( "/v1/search", serde_json::json!( { "q" : "cached" } ), HttpMethod::Get );
  let key = manager.generate_cache_key( "/v1/search", &serde_json::json!( { "q" : "cached" } ), "GET" );
  manager.store_response( &key, sample_store_input( b"{\"ok\":true}" ), &AlwaysCache );

  let client = BaseClient::new( manager );
  let live_job = RequestJob::new( "/v1/search", serde_json::json!( { "q" : "live" } ), HttpMethod::Get );
  let jobs = vec![ cached_job, live_job ];

  let token = CancellationToken::new();
  assert!( !token.is_cancelled() );
  token.cancel();
  assert!( token.is_cancelled() );

  let results = client
    .send_cached_requests_parallel( &jobs, "https://api.example.com", None, &NoAuth, None, Some( &token ) )
    .await
    .expect( "capacity check passes before cancellation is consulted" );

  assert_eq!( results.len(), 2 );
  assert!( results[ 0 ].as_ref().is_ok_and( | r | r.is_cached ), "cache hit must bypass the cancellation race entirely" );
  assert!( matches!( results[ 1 ], Err( the_module::error::ApiCacheError::Cancelled( _ ) ) ) );
}
