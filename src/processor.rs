//! Response processing framework (C8)
//!
//! A processor targets one endpoint family and normalizes raw cached
//! responses into relational tables, idempotently: `processed_at` is set
//! exactly once per response per processor, and a response already
//! claimed by a processor is never re-extracted without an explicit
//! `reset_processed`.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use std::sync::Arc;
  use chrono::Utc;
  use serde_json::Value;

  use crate::storage::CacheStorage;

  /// Aggregate counters returned by a processing run
  #[ derive( Debug, Clone, Copy, Default ) ]
  pub struct Stats
  {
    /// Rows newly marked `processed_at` this run, with status OK
    pub processed_ok : u64,
    /// Rows newly marked `processed_at` this run, with status ERROR
    pub processed_error : u64,
    /// Rows scanned but left unmarked (pattern mismatch or non-200)
    pub skipped : u64,
    /// Entities upserted into destination tables
    pub entities_upserted : u64,
    /// Entities counted as duplicate (update declined by `update_if_newer`)
    pub entities_duplicate : u64,
    /// Destination rows removed by `clear_processed_tables`, when measured
    pub cleared : Option< u64 >,
  }

  impl Stats
  {
    fn accumulate( &mut self, other : Stats )
    {
      self.processed_ok += other.processed_ok;
      self.processed_error += other.processed_error;
      self.skipped += other.skipped;
      self.entities_upserted += other.entities_upserted;
      self.entities_duplicate += other.entities_duplicate;
    }
  }

  /// Per-processor mutable policy knobs
  #[ derive( Debug, Clone, Copy ) ]
  pub struct ProcessorPolicy
  {
    /// Skip rows whose `base_url` identifies a sandbox endpoint
    pub skip_sandbox : bool,
    /// On a natural-key collision, overwrite only when the new response's
    /// datetime is strictly newer than the existing row's
    pub update_if_newer : bool,
    /// Whether to descend into nested structures (e.g. People-Also-Ask
    /// items inside a SERP) when extracting entities
    pub skip_nested_items : bool,
  }

  impl Default for ProcessorPolicy
  {
    fn default() -> Self
    {
      Self
      {
        skip_sandbox : true,
        update_if_newer : true,
        skip_nested_items : false,
      }
    }
  }

  impl ProcessorPolicy
  {
    /// Default policy: `skip_sandbox=true`, `update_if_newer=true`,
    /// `skip_nested_items=false`
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Override `skip_sandbox`
    #[ must_use ]
    pub fn with_skip_sandbox( mut self, value : bool ) -> Self
    {
      self.skip_sandbox = value;
      self
    }

    /// Override `update_if_newer`
    #[ must_use ]
    pub fn with_update_if_newer( mut self, value : bool ) -> Self
    {
      self.update_if_newer = value;
      self
    }

    /// Override `skip_nested_items`
    #[ must_use ]
    pub fn with_skip_nested_items( mut self, value : bool ) -> Self
    {
      self.skip_nested_items = value;
      self
    }
  }

  /// One extracted entity plus the natural key a destination-table upsert
  /// keys on
  #[ derive( Debug, Clone ) ]
  pub struct ExtractedEntity
  {
    /// Natural composite key (e.g. `{keyword, location_code, ...}`)
    pub natural_key : Value,
    /// The entity payload to upsert
    pub payload : Value,
  }

  /// Per-processor extraction logic; the framework supplies the scan loop,
  /// idempotence bookkeeping, and policy application.
  pub trait Processor : Send + Sync
  {
    /// Endpoint suffix this processor claims responses for (exact match)
    fn endpoint_pattern( &self ) -> &str;

    /// Parse a response body into entities
    ///
    /// Returns an error describing why extraction failed (invalid JSON,
    /// missing required top-level structure); the framework marks the row
    /// ERROR-processed rather than retrying it.
    fn extract( &self, response_body : &[ u8 ], policy : ProcessorPolicy ) -> Result< Vec< ExtractedEntity >, String >;

    /// Upsert one entity into the destination table(s); returns `true` if
    /// a new row was inserted or an existing row was updated, `false` if
    /// it was skipped as a stale duplicate.
    fn upsert( &self, entity : &ExtractedEntity, response_id : &str, policy : ProcessorPolicy ) -> bool;

    /// Remove all destination rows this processor owns; returns a count
    /// when `with_count` is true.
    fn clear_destination_tables( &self, with_count : bool ) -> Option< u64 >;
  }

  /// Runs a [`Processor`] over a client's cached responses
  #[ derive( Debug, Clone ) ]
  pub struct ProcessorRunner< P >
  {
    client : String,
    storage : Arc< dyn CacheStorage >,
    processor : Arc< P >,
    policy : ProcessorPolicy,
  }

  impl< P : Processor > ProcessorRunner< P >
  {
    /// Build a runner for `processor` over `client`'s rows
    #[ must_use ]
    pub fn new( client : impl Into< String >, storage : Arc< dyn CacheStorage >, processor : Arc< P > ) -> Self
    {
      Self { client : client.into(), storage, processor, policy : ProcessorPolicy::new() }
    }

    /// Replace the policy knobs wholesale
    #[ must_use ]
    pub fn with_policy( mut self, policy : ProcessorPolicy ) -> Self
    {
      self.policy = policy;
      self
    }

    fn is_sandbox( base_url : &str ) -> bool
    {
      base_url.contains( "sandbox" )
    }

    /// Scan up to `limit` unprocessed rows matching the endpoint pattern
    /// and extract entities from each.
    pub fn process_responses( &self, limit : usize ) -> Stats
    {
      let mut stats = Stats::default();
      let mut processed_count = 0usize;

      for mut row in self.storage.rows_for_client( &self.client )
      {
        if processed_count >= limit
        {
          break;
        }
        if row.processed_at.is_some()
        {
          continue;
        }
        if row.endpoint != self.processor.endpoint_pattern()
        {
          continue;
        }
        if row.response_status_code != 200 || ( self.policy.skip_sandbox && Self::is_sandbox( &row.base_url ) )
        {
          stats.skipped += 1;
          continue;
        }

        processed_count += 1;

        match self.processor.extract( &row.response_body, self.policy )
        {
          Ok( entities ) =>
          {
            let mut upserted = 0u64;
            let mut duplicate = 0u64;
            for entity in &entities
            {
              if self.processor.upsert( entity, &row.key, self.policy )
              {
                upserted += 1;
              }
              else
              {
                duplicate += 1;
              }
            }
            row.processed_at = Some( Utc::now() );
            row.processed_status = Some( serde_json::json!
            (
              { "status" : "OK", "counts" : entities.len() }
            ) );
            stats.processed_ok += 1;
            stats.entities_upserted += upserted;
            stats.entities_duplicate += duplicate;
          },
          Err( error ) =>
          {
            row.processed_at = Some( Utc::now() );
            row.processed_status = Some( serde_json::json!
            (
              { "status" : "ERROR", "error" : error, "counts" : 0 }
            ) );
            stats.processed_error += 1;
          },
        }

        self.storage.update( &self.client, &row.key.clone(), row );
      }

      stats
    }

    /// Loop `process_responses` until no unprocessed rows remain,
    /// accumulating stats across batches.
    pub fn process_responses_all( &self, batch_size : usize ) -> Stats
    {
      let mut total = Stats::default();
      loop
      {
        let batch = self.process_responses( batch_size );
        if batch.processed_ok == 0 && batch.processed_error == 0
        {
          break;
        }
        total.accumulate( batch );
      }
      total
    }

    /// Clear `processed_at`/`processed_status` for rows matching this
    /// processor's endpoint pattern only.
    pub fn reset_processed( &self )
    {
      for mut row in self.storage.rows_for_client( &self.client )
      {
        if row.endpoint == self.processor.endpoint_pattern()
        {
          row.processed_at = None;
          row.processed_status = None;
          self.storage.update( &self.client, &row.key.clone(), row );
        }
      }
    }

    /// Truncate this processor's destination tables
    pub fn clear_processed_tables( &self, with_count : bool ) -> Stats
    {
      Stats { cleared : self.processor.clear_destination_tables( with_count ), ..Stats::default() }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::storage::{ CacheEntry, InMemoryCacheStorage };
    use parking_lot::Mutex;

    struct CountingProcessor
    {
      destination : Mutex< Vec< Value > >,
    }

    impl Processor for CountingProcessor
    {
      fn endpoint_pattern( &self ) -> &str
      {
        "/v1/serp"
      }

      fn extract( &self, response_body : &[ u8 ], _policy : ProcessorPolicy ) -> Result< Vec< ExtractedEntity >, String >
      {
        let value : Value = serde_json::from_slice( response_body ).map_err( | e | e.to_string() )?;
        let items = value.get( "items" ).and_then( Value::as_array ).ok_or_else( || "missing items".to_string() )?;
        Ok
        (
          items.iter().map( | item | ExtractedEntity { natural_key : item.clone(), payload : item.clone() } ).collect()
        )
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

    fn seed_row( storage : &InMemoryCacheStorage, key : &str, endpoint : &str, body : &[ u8 ] )
    {
      storage.put( "acme", key, CacheEntry
      {
        key : key.to_string(),
        client : "acme".to_string(),
        endpoint : endpoint.to_string(),
        method : "GET".to_string(),
        base_url : "https://api.example.com".to_string(),
        full_url : "https://api.example.com".to_string(),
        version : None,
        attributes : None,
        attributes2 : None,
        attributes3 : None,
        credits : 1,
        cost : None,
        request_headers : Vec::new(),
        request_body : Vec::new(),
        response_headers : Vec::new(),
        response_body : body.to_vec(),
        response_status_code : 200,
        response_size : body.len(),
        response_time : 0.1,
        expires_at : None,
        compressed : false,
        processed_at : None,
        processed_status : None,
        created_at : Utc::now(),
        updated_at : Utc::now(),
      } );
    }

    #[ test ]
    fn processes_two_items_and_marks_the_row_ok()
    {
      let storage = Arc::new( InMemoryCacheStorage::new() );
      seed_row( &storage, "k1", "/v1/serp", br#"{"items":[{"a":1},{"a":2}]}"# );

      let processor = Arc::new( CountingProcessor { destination : Mutex::new( Vec::new() ) } );
      let runner = ProcessorRunner::new( "acme", storage.clone(), processor );

      let stats = runner.process_responses( 10 );
      assert_eq!( stats.processed_ok, 1 );
      assert_eq!( stats.entities_upserted, 2 );

      let row = storage.get( "acme", "k1" ).unwrap();
      assert!( row.processed_at.is_some() );

      let stats2 = runner.process_responses( 10 );
      assert_eq!( stats2.processed_ok, 0 );
    }

    #[ test ]
    fn invalid_body_marks_row_error_once()
    {
      let storage = Arc::new( InMemoryCacheStorage::new() );
      seed_row( &storage, "k1", "/v1/serp", b"not json" );

      let processor = Arc::new( CountingProcessor { destination : Mutex::new( Vec::new() ) } );
      let runner = ProcessorRunner::new( "acme", storage, processor );

      let stats = runner.process_responses( 10 );
      assert_eq!( stats.processed_error, 1 );

      let stats2 = runner.process_responses( 10 );
      assert_eq!( stats2.processed_ok + stats2.processed_error, 0 );
    }

    struct OtherProcessor
    {
      destination : Mutex< Vec< Value > >,
    }

    impl Processor for OtherProcessor
    {
      fn endpoint_pattern( &self ) -> &str
      {
        "/v1/other"
      }

      fn extract( &self, response_body : &[ u8 ], _policy : ProcessorPolicy ) -> Result< Vec< ExtractedEntity >, String >
      {
        let value : Value = serde_json::from_slice( response_body ).map_err( | e | e.to_string() )?;
        let items = value.get( "items" ).and_then( Value::as_array ).ok_or_else( || "missing items".to_string() )?;
        Ok
        (
          items.iter().map( | item | ExtractedEntity { natural_key : item.clone(), payload : item.clone() } ).collect()
        )
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

    #[ test ]
    fn reset_processed_only_touches_matching_endpoint()
    {
      let storage = Arc::new( InMemoryCacheStorage::new() );
      seed_row( &storage, "k1", "/v1/serp", br#"{"items":[]}"# );
      seed_row( &storage, "k2", "/v1/other", br#"{"items":[]}"# );

      let serp_processor = Arc::new( CountingProcessor { destination : Mutex::new( Vec::new() ) } );
      let serp_runner = ProcessorRunner::new( "acme", storage.clone(), serp_processor );
      serp_runner.process_responses( 10 );

      let other_processor = Arc::new( OtherProcessor { destination : Mutex::new( Vec::new() ) } );
      let other_runner = ProcessorRunner::new( "acme", storage.clone(), other_processor );
      other_runner.process_responses( 10 );

      assert!( storage.get( "acme", "k1" ).unwrap().processed_at.is_some() );
      assert!( storage.get( "acme", "k2" ).unwrap().processed_at.is_some() );

      serp_runner.reset_processed();

      assert!( storage.get( "acme", "k1" ).unwrap().processed_at.is_none() );
      assert!( storage.get( "acme", "k2" ).unwrap().processed_at.is_some() );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    Stats,
    ProcessorPolicy,
    ExtractedEntity,
    Processor,
    ProcessorRunner,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
