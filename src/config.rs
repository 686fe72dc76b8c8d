//! Client descriptor configuration
//!
//! A `ClientConfig` is the recognized shape under `api-cache.apis.<client>`
//! in the data model (spec §3). Built explicitly via constructor + builder
//! methods, never assembled from an ambient global — matching the
//! "explicit construction over singletons" principle `secret.rs` already
//! follows for credentials.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use std::collections::HashMap;
  use crate::secret::Secret;

  /// Recognized configuration for one upstream client
  #[ derive( Debug, Clone ) ]
  pub struct ClientConfig
  {
    /// Short client name, used to namespace cache rows and rate-limit keys
    name : String,
    /// Upstream base URL
    base_url : String,
    /// API version segment inserted between base url and endpoint
    version : Option< String >,
    /// Credentials for this client
    credentials : Secret,
    /// Rate-limit ceiling; `None` means unlimited
    rate_limit_max_attempts : Option< u64 >,
    /// Rate-limit window length in seconds
    rate_limit_decay_seconds : u64,
    /// Whether stored response bodies are gzip-compressed
    compression_enabled : bool,
    /// Default cache entry time-to-live in seconds
    cache_ttl : Option< i64 >,
    /// Deferred-task postback endpoint
    postback_url : Option< String >,
    /// Deferred-task pingback endpoint
    pingback_url : Option< String >,
  }

  impl ClientConfig
  {
    /// Build an explicit configuration (no defaults)
    #[ must_use ]
    pub fn with_explicit_config
    (
      name : impl Into< String >,
      base_url : impl Into< String >,
      credentials : Secret,
      rate_limit_max_attempts : Option< u64 >,
      rate_limit_decay_seconds : u64,
      compression_enabled : bool,
    ) -> Self
    {
      Self
      {
        name : name.into(),
        base_url : base_url.into(),
        version : None,
        credentials,
        rate_limit_max_attempts,
        rate_limit_decay_seconds,
        compression_enabled,
        cache_ttl : None,
        postback_url : None,
        pingback_url : None,
      }
    }

    /// Compatibility wrapper with sensible defaults: unlimited rate limit,
    /// 60s decay window, compression off.
    ///
    /// NOTE: for explicit control, use `with_explicit_config`
    #[ must_use ]
    pub fn new( name : impl Into< String >, base_url : impl Into< String >, credentials : Secret ) -> Self
    {
      Self::with_explicit_config( name, base_url, credentials, None, 60, false )
    }

    /// Set the API version segment
    #[ must_use ]
    pub fn with_version( mut self, version : impl Into< String > ) -> Self
    {
      self.version = Some( version.into() );
      self
    }

    /// Set the default cache TTL in seconds
    #[ must_use ]
    pub fn with_cache_ttl( mut self, ttl_seconds : i64 ) -> Self
    {
      self.cache_ttl = Some( ttl_seconds );
      self
    }

    /// Set the deferred-task postback URL
    #[ must_use ]
    pub fn with_postback_url( mut self, url : impl Into< String > ) -> Self
    {
      self.postback_url = Some( url.into() );
      self
    }

    /// Set the deferred-task pingback URL
    #[ must_use ]
    pub fn with_pingback_url( mut self, url : impl Into< String > ) -> Self
    {
      self.pingback_url = Some( url.into() );
      self
    }

    /// Short client name
    #[ must_use ]
    pub fn name( &self ) -> &str
    {
      &self.name
    }

    /// Upstream base URL
    #[ must_use ]
    pub fn base_url( &self ) -> &str
    {
      &self.base_url
    }

    /// API version segment, if configured
    #[ must_use ]
    pub fn version( &self ) -> Option< &str >
    {
      self.version.as_deref()
    }

    /// Credentials for this client
    #[ must_use ]
    pub fn credentials( &self ) -> &Secret
    {
      &self.credentials
    }

    /// Rate-limit ceiling; `None` means unlimited
    #[ must_use ]
    pub fn rate_limit_max_attempts( &self ) -> Option< u64 >
    {
      self.rate_limit_max_attempts
    }

    /// Rate-limit window length in seconds
    #[ must_use ]
    pub fn rate_limit_decay_seconds( &self ) -> u64
    {
      self.rate_limit_decay_seconds
    }

    /// Whether stored response bodies are gzip-compressed
    #[ must_use ]
    pub fn compression_enabled( &self ) -> bool
    {
      self.compression_enabled
    }

    /// Default cache entry time-to-live, if configured
    #[ must_use ]
    pub fn cache_ttl( &self ) -> Option< i64 >
    {
      self.cache_ttl
    }

    /// Deferred-task postback endpoint, if configured
    #[ must_use ]
    pub fn postback_url( &self ) -> Option< &str >
    {
      self.postback_url.as_deref()
    }

    /// Deferred-task pingback endpoint, if configured
    #[ must_use ]
    pub fn pingback_url( &self ) -> Option< &str >
    {
      self.pingback_url.as_deref()
    }

    /// Compose the full dispatch URL for an endpoint
    #[ must_use ]
    pub fn full_url( &self, endpoint : &str ) -> String
    {
      match &self.version
      {
        Some( version ) => format!( "{}/{version}/{endpoint}", self.base_url.trim_end_matches( '/' ) ),
        None => format!( "{}/{endpoint}", self.base_url.trim_end_matches( '/' ) ),
      }
    }
  }

  /// Registry of client configurations, keyed by client name
  #[ derive( Debug, Default ) ]
  pub struct ClientRegistry
  {
    clients : HashMap< String, ClientConfig >,
  }

  impl ClientRegistry
  {
    /// Create an empty registry
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Register (or replace) a client configuration
    #[ must_use ]
    pub fn with_client( mut self, config : ClientConfig ) -> Self
    {
      self.clients.insert( config.name().to_string(), config );
      self
    }

    /// Look up a client's configuration by name
    #[ must_use ]
    pub fn get( &self, name : &str ) -> Option< &ClientConfig >
    {
      self.clients.get( name )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn full_url_with_version()
    {
      let config = ClientConfig::new( "acme", "https://api.acme.test/", Secret::api_key( "k".into() ).unwrap() )
        .with_version( "v2" );
      assert_eq!( config.full_url( "widgets" ), "https://api.acme.test/v2/widgets" );
    }

    #[ test ]
    fn full_url_without_version()
    {
      let config = ClientConfig::new( "acme", "https://api.acme.test", Secret::api_key( "k".into() ).unwrap() );
      assert_eq!( config.full_url( "widgets" ), "https://api.acme.test/widgets" );
    }

    #[ test ]
    fn registry_looks_up_by_name()
    {
      let config = ClientConfig::new( "acme", "https://api.acme.test", Secret::api_key( "k".into() ).unwrap() );
      let registry = ClientRegistry::new().with_client( config );
      assert!( registry.get( "acme" ).is_some() );
      assert!( registry.get( "missing" ).is_none() );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    ClientConfig,
    ClientRegistry,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
