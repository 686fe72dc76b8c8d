//! Base client implementation: cache → rate-limit → dispatch → store.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use super::super::types::orphan::*;
  use std::sync::Arc;
  use std::time::{ Duration, Instant };
  use futures::future::join_all;
  use tokio::sync::Semaphore;

  use crate::cache_manager::{ CacheManager, ShouldCache };
  use crate::error::{ ApiCacheError, ApiCacheResult };
  use crate::storage::StoreResponseInput;

  struct HookShouldCache< 'a >( &'a dyn ClientHooks );

  impl ShouldCache for HookShouldCache< '_ >
  {
    fn should_cache( &self, response_body : &[ u8 ] ) -> bool
    {
      self.0.should_cache( response_body )
    }
  }

  /// Default bound on concurrent live jobs in a parallel dispatch, per the
  /// concurrency model's `min(jobCount, 10)` recommendation.
  pub const DEFAULT_PARALLEL_LIMIT : usize = 10;

  /// The base HTTP client every upstream-client facade is built over
  #[ derive( Debug, Clone ) ]
  pub struct BaseClient
  {
    manager : Arc< CacheManager >,
    http : reqwest::Client,
    timeout : Duration,
  }

  impl BaseClient
  {
    /// Build a base client over an explicit cache manager
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client fails to build
    #[ must_use ]
    pub fn new( manager : Arc< CacheManager > ) -> Self
    {
      Self::with_timeout( manager, Duration::from_secs( 30 ) )
    }

    /// Build a base client with an explicit per-request timeout
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client fails to build
    #[ must_use ]
    pub fn with_timeout( manager : Arc< CacheManager >, timeout : Duration ) -> Self
    {
      let http = reqwest::Client::builder()
        .timeout( timeout )
        .build()
        .expect( "failed to build HTTP client" );

      Self { manager, http, timeout }
    }

    /// Cache manager this client dispatches through
    #[ must_use ]
    pub fn manager( &self ) -> &Arc< CacheManager >
    {
      &self.manager
    }

    /// §4.6.1 `sendCachedRequest`: cache lookup, rate-limit reservation,
    /// dispatch, accounting, error routing, and conditional store, in
    /// that order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiCacheError::RateLimitExceeded`] before any dispatch
    /// when the client has no credits left, or [`ApiCacheError::Network`]
    /// / [`ApiCacheError::Timeout`] when the transport fails. HTTP status
    /// ≥ 400 is not an error here — it is returned as a normal
    /// [`DispatchResult`] with the status code set, per the failure
    /// semantics table.
    pub async fn send_cached_request
    (
      &self,
      job : &RequestJob,
      base_url : &str,
      version : Option< &str >,
      hooks : &dyn ClientHooks,
    ) -> ApiCacheResult< DispatchResult >
    {
      let key = self.manager.generate_cache_key( &job.endpoint, &job.params, job.method.as_str() );

      if job.use_cache
      {
        if let Some( cached ) = self.manager.get_cached_response( &key )
        {
          return Ok( DispatchResult
          {
            full_url : cached.request.full_url,
            response_headers : cached.response.headers,
            response_body : cached.response.body,
            response_status_code : cached.response.status_code,
            response_size : cached.response_size,
            response_time : cached.response_time,
            is_cached : true,
          } );
        }
      }

      if !self.manager.allow_request() || self.manager.remaining_attempts() < job.amount
      {
        return Err( DispatchError::RateLimited( ApiCacheError::RateLimitExceeded
        {
          client : self.manager.client().to_string(),
          available_in : self.manager.available_in(),
        } ).into() );
      }

      let full_url = match version
      {
        Some( v ) => format!( "{}/{v}/{}", base_url.trim_end_matches( '/' ), job.endpoint ),
        None => format!( "{}/{}", base_url.trim_end_matches( '/' ), job.endpoint ),
      };

      let mut request = match job.method
      {
        HttpMethod::Get => self.http.get( &full_url ).query( &job.params ),
        HttpMethod::Post => self.http.post( &full_url ).json( &job.params ),
      };

      for ( name, value ) in hooks.auth_headers()
      {
        request = request.header( name, value );
      }
      for ( name, value ) in hooks.auth_params()
      {
        request = request.query( &[ ( name, value ) ] );
      }

      let started = Instant::now();
      let response = request.send().await.map_err( | e | DispatchError::Network( ApiCacheError::from( e ) ) )?;
      let response_time = started.elapsed().as_secs_f64();

      self.manager.increment_attempts( job.amount );

      let status = response.status().as_u16();
      let response_headers = format_headers( response.headers() );
      let body = response.bytes().await.map_err( ApiCacheError::from )?.to_vec();

      if status >= 400
      {
        self.manager.log_error( hooks.log_http_error( self.manager.client(), status, &job.endpoint, &body ) );
      }

      let cost = hooks.calculate_cost( &body );
      let credits = hooks.calculate_credits( &body, job.amount );

      let input = StoreResponseInput
      {
        endpoint : job.endpoint.clone(),
        method : job.method.as_str().to_string(),
        base_url : base_url.to_string(),
        full_url : full_url.clone(),
        version : version.map( str::to_string ),
        attributes : job.attributes.clone(),
        credits,
        cost,
        request_headers : Vec::new(),
        request_body : serde_json::to_vec( &job.params ).unwrap_or_default(),
        response_headers : response_headers.clone(),
        response_body : body.clone(),
        response_status_code : status,
        response_time,
        ttl : job.ttl,
      };

      self.manager.store_response( &key, input, &HookShouldCache( hooks ) );

      Ok( DispatchResult
      {
        full_url,
        response_headers,
        response_body : body.clone(),
        response_status_code : status,
        response_size : body.len(),
        response_time,
        is_cached : false,
      } )
    }

    /// §4.6.2 parallel dispatch: verifies capacity for all live jobs up
    /// front, then fans live jobs out bounded by `limit`
    /// (`min(jobCount, 10)` if `None`), preserving input order in the
    /// output.
    ///
    /// `cancel`, if given, is raced against every live job with
    /// `tokio::select!`: once it fires, jobs still in flight are dropped
    /// (which cancels their underlying HTTP request) and surface as
    /// [`ApiCacheError::Cancelled`] in their output slot, while jobs that
    /// had already completed keep their real result. A cached hit never
    /// races the token — it never reaches the network.
    ///
    /// # Errors
    ///
    /// Returns [`ApiCacheError::RateLimitExceeded`] before any dispatch
    /// if the sum of live jobs' `amount` exceeds the client's remaining
    /// attempts.
    pub async fn send_cached_requests_parallel
    (
      &self,
      jobs : &[ RequestJob ],
      base_url : &str,
      version : Option< &str >,
      hooks : &( dyn ClientHooks + Sync ),
      limit : Option< usize >,
      cancel : Option< &CancellationToken >,
    ) -> ApiCacheResult< Vec< ApiCacheResult< DispatchResult > > >
    {
      let mut cache_hits : Vec< Option< DispatchResult > > = Vec::with_capacity( jobs.len() );
      let mut live_amount = 0u64;

      for job in jobs
      {
        let key = self.manager.generate_cache_key( &job.endpoint, &job.params, job.method.as_str() );
        let hit = if job.use_cache { self.manager.get_cached_response( &key ) } else { None };

        match hit
        {
          Some( cached ) => cache_hits.push( Some( DispatchResult
          {
            full_url : cached.request.full_url,
            response_headers : cached.response.headers,
            response_body : cached.response.body,
            response_status_code : cached.response.status_code,
            response_size : cached.response_size,
            response_time : cached.response_time,
            is_cached : true,
          } ) ),
          None =>
          {
            live_amount += job.amount;
            cache_hits.push( None );
          },
        }
      }

      if live_amount > self.manager.remaining_attempts()
      {
        return Err( DispatchError::RateLimited( ApiCacheError::RateLimitExceeded
        {
          client : self.manager.client().to_string(),
          available_in : self.manager.available_in(),
        } ).into() );
      }

      let bound = limit.unwrap_or( jobs.len().min( DEFAULT_PARALLEL_LIMIT ) ).max( 1 );
      let semaphore = Arc::new( Semaphore::new( bound ) );

      let futures = jobs.iter().zip( cache_hits.into_iter() ).map( | ( job, hit ) |
      {
        let semaphore = Arc::clone( &semaphore );
        async move
        {
          if let Some( result ) = hit
          {
            return Ok( result );
          }
          let _permit = semaphore.acquire().await.expect( "semaphore closed" );

          match cancel
          {
            Some( token ) =>
            {
              tokio::select!
              {
                biased;
                () = token.cancelled() => Err( DispatchError::Cancelled
                (
                  ApiCacheError::Cancelled( "dispatch aborted by caller".to_string() )
                ).into() ),
                result = self.send_cached_request( job, base_url, version, hooks ) => result,
              }
            },
            None => self.send_cached_request( job, base_url, version, hooks ).await,
          }
        }
      } );

      Ok( join_all( futures ).await )
    }
  }

  fn format_headers( headers : &reqwest::header::HeaderMap ) -> Vec< u8 >
  {
    let mut out = String::new();
    for ( name, value ) in headers
    {
      out.push_str( name.as_str() );
      out.push_str( ": " );
      out.push_str( value.to_str().unwrap_or( "<binary>" ) );
      out.push( '\n' );
    }
    out.into_bytes()
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::rate_limit::RateLimiterConfig;

    struct NoAuth;
    impl ClientHooks for NoAuth
    {
      fn auth_headers( &self ) -> std::collections::HashMap< String, String >
      {
        std::collections::HashMap::new()
      }
    }

    #[ tokio::test ]
    async fn parallel_dispatch_rejects_before_any_call_when_over_capacity()
    {
      let config = RateLimiterConfig::with_explicit_config( Some( 1 ), 60 );
      let manager = Arc::new( CacheManager::with_in_memory_stores( "acme", "v1", false, config ) );
      let client = BaseClient::new( manager );

      let jobs = vec!
      [
        RequestJob::new( "/widgets", serde_json::json!( { "q" : "a" } ), HttpMethod::Get ),
        RequestJob::new( "/widgets", serde_json::json!( { "q" : "b" } ), HttpMethod::Get ),
      ];

      let result = client.send_cached_requests_parallel( &jobs, "https://api.example.com", None, &NoAuth, None, None ).await;
      assert!( matches!( result, Err( ApiCacheError::RateLimitExceeded { .. } ) ) );
    }

    #[ tokio::test ]
    async fn parallel_dispatch_cancels_in_flight_jobs()
    {
      let config = RateLimiterConfig::with_explicit_config( Some( 10 ), 60 );
      let manager = Arc::new( CacheManager::with_in_memory_stores( "acme", "v1", false, config ) );
      let client = BaseClient::new( manager );

      let jobs = vec!
      [
        RequestJob::new( "/widgets", serde_json::json!( { "q" : "a" } ), HttpMethod::Get ),
        RequestJob::new( "/widgets", serde_json::json!( { "q" : "b" } ), HttpMethod::Get ),
      ];

      let token = CancellationToken::new();
      token.cancel();

      let results = client
        .send_cached_requests_parallel( &jobs, "https://api.example.com", None, &NoAuth, None, Some( &token ) )
        .await
        .expect( "capacity check passes; cancellation happens per job" );

      assert_eq!( results.len(), 2 );
      for result in results
      {
        assert!( matches!( result, Err( ApiCacheError::Cancelled( _ ) ) ) );
      }
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    BaseClient,
    DEFAULT_PARALLEL_LIMIT,
  };
}
