//! Deferred-task reconciliation (C7) — the tag-threading pattern
//!
//! Some upstream APIs are asynchronous: a client posts a task and the
//! provider delivers the result later, out of band (webhook/pingback) or
//! via polling. The cache key computed from the *search* parameters
//! alone (`tag`) is the thread that ties the post and the eventual
//! result together.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use serde_json::Value;

  use crate::cache_manager::{ AlwaysCache, CacheManager };
  use crate::client::{ BaseClient, ClientHooks, DispatchResult, HttpMethod, RequestJob };
  use crate::error::ApiCacheResult;
  use crate::storage::StoreResponseInput;

  /// Result of a `Standard*` call: either the cached payload was already
  /// there, or a task-post acknowledgment is returned in its place.
  #[ derive( Debug, Clone ) ]
  pub enum StandardResult
  {
    /// The search key was already cached; no task was posted
    Cached( DispatchResult ),
    /// No cached result; a task was posted and this is its acknowledgment
    TaskPosted( DispatchResult ),
    /// No cached result and `post_task_if_not_cached` was false
    NotCachedNoPost
    {
      /// The tag (search-params cache key) callers thread through the
      /// webhook delivery
      tag : String,
    },
  }

  /// Parameters for one deferred-task lookup/post
  #[ derive( Debug, Clone ) ]
  pub struct StandardRequest
  {
    /// Endpoint the eventual task result is cached under
    pub endpoint : String,
    /// Search parameters only — webhook URLs and control flags excluded
    pub search_params : Value,
    /// If not cached, whether to call `taskPost`
    pub post_task_if_not_cached : bool,
    /// Endpoint the provider's task-post acknowledgment is sent to
    pub task_post_endpoint : String,
    /// Deferred-task postback URL, if any
    pub postback_url : Option< String >,
    /// Type label sent as `postback_data`
    pub postback_data : Option< String >,
    /// Deferred-task pingback URL, if any
    pub pingback_url : Option< String >,
  }

  /// Reconciles cache lookups against provider-delivered deferred results
  #[ derive( Debug, Clone ) ]
  pub struct DeferredTaskReconciler
  {
    client : BaseClient,
    base_url : String,
    version : Option< String >,
  }

  impl DeferredTaskReconciler
  {
    /// Build a reconciler over an existing base client
    #[ must_use ]
    pub fn new( client : BaseClient, base_url : impl Into< String >, version : Option< String > ) -> Self
    {
      Self { client, base_url : base_url.into(), version }
    }

    /// The tag (cache key over search params alone) a `Standard*` call
    /// will look under, and that a webhook delivery must thread back.
    #[ must_use ]
    pub fn tag_for( &self, manager : &CacheManager, request : &StandardRequest ) -> String
    {
      manager.generate_cache_key( &request.endpoint, &request.search_params, HttpMethod::Get.as_str() )
    }

    /// `Standard*` method flow: look up by tag; if absent and requested,
    /// post the task under the same tag so the provider's later delivery
    /// threads back to it.
    ///
    /// # Errors
    ///
    /// Propagates rate-limit/network failures from the underlying task post.
    pub async fn standard_call
    (
      &self,
      manager : &CacheManager,
      request : &StandardRequest,
      hooks : &dyn ClientHooks,
    ) -> ApiCacheResult< StandardResult >
    {
      let tag = self.tag_for( manager, request );

      if let Some( cached ) = manager.get_cached_response( &tag )
      {
        return Ok( StandardResult::Cached( DispatchResult
        {
          full_url : cached.request.full_url,
          response_headers : cached.response.headers,
          response_body : cached.response.body,
          response_status_code : cached.response.status_code,
          response_size : cached.response_size,
          response_time : cached.response_time,
          is_cached : true,
        } ) );
      }

      if !request.post_task_if_not_cached
      {
        return Ok( StandardResult::NotCachedNoPost { tag } );
      }

      let mut post_params = serde_json::Map::new();
      post_params.insert( "tag".to_string(), Value::String( tag.clone() ) );
      if let Some( url ) = &request.postback_url
      {
        post_params.insert( "postback_url".to_string(), Value::String( url.clone() ) );
      }
      if let Some( data ) = &request.postback_data
      {
        post_params.insert( "postback_data".to_string(), Value::String( data.clone() ) );
      }
      if let Some( url ) = &request.pingback_url
      {
        post_params.insert( "pingback_url".to_string(), Value::String( url.clone() ) );
      }

      let job = RequestJob::new( request.task_post_endpoint.clone(), Value::Object( post_params ), HttpMethod::Post );
      let result = self.client.send_cached_request( &job, &self.base_url, self.version.as_deref(), hooks ).await?;

      Ok( StandardResult::TaskPosted( result ) )
    }

    /// External webhook-handler contract: given a delivered payload whose
    /// `tag` field names the cache key, store the final result under that
    /// key so the next `standard_call` with identical search params hits
    /// the cache.
    pub fn deliver( &self, manager : &CacheManager, tag : &str, input : StoreResponseInput )
    {
      manager.store_response( tag, input, &AlwaysCache );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    StandardResult,
    StandardRequest,
    DeferredTaskReconciler,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
