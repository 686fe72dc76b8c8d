//! Deterministic cache key generation (C3)
//!
//! A key is the SHA-256 digest of a canonical string built from the
//! client, method, version, endpoint, and a normalized JSON serialization
//! of the call parameters. Normalization sorts object keys recursively so
//! that semantically equivalent params (same keys/values, any order)
//! always hash to the same key; arrays keep their given order.

#[ cfg( feature = "enabled" ) ]
mod private
{
  use sha2::{ Digest, Sha256 };
  use serde_json::Value;

  /// Recursively sort every object's keys, leaving arrays untouched
  fn canonicalize( value : &Value ) -> Value
  {
    match value
    {
      Value::Object( map ) =>
      {
        let mut sorted : std::collections::BTreeMap< String, Value > = std::collections::BTreeMap::new();
        for ( key, val ) in map
        {
          sorted.insert( key.clone(), canonicalize( val ) );
        }
        let mut out = serde_json::Map::new();
        for ( key, val ) in sorted
        {
          out.insert( key, val );
        }
        Value::Object( out )
      },
      Value::Array( items ) => Value::Array( items.iter().map( canonicalize ).collect() ),
      other => other.clone(),
    }
  }

  /// Stable, whitespace-free JSON serialization with recursively sorted
  /// object keys.
  #[ must_use ]
  pub fn canonical_json( params : &Value ) -> String
  {
    let canonical = canonicalize( params );
    serde_json::to_string( &canonical ).unwrap_or_default()
  }

  /// Produce the 64-hex-char SHA-256 cache key for one call
  ///
  /// Parameters deliberately excluded from the key (webhook URLs, control
  /// flags) must already be stripped from `params` by the caller.
  #[ must_use ]
  pub fn generate_cache_key
  (
    client : &str,
    endpoint : &str,
    params : &Value,
    method : &str,
    version : &str,
  ) -> String
  {
    let canonical = format!( "{client}|{method}|{version}|{endpoint}|{}", canonical_json( params ) );
    let digest = Sha256::digest( canonical.as_bytes() );
    digest.iter().map( | byte | format!( "{byte:02x}" ) ).collect()
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use serde_json::json;

    #[ test ]
    fn key_is_64_hex_chars()
    {
      let key = generate_cache_key( "acme", "/v1/widgets", &json!( { "a" : 1 } ), "GET", "v1" );
      assert_eq!( key.len(), 64 );
      assert!( key.chars().all( | c | c.is_ascii_hexdigit() && !c.is_uppercase() ) );
    }

    #[ test ]
    fn key_is_order_independent_over_object_keys()
    {
      let a = json!( { "beta" : 2, "alpha" : 1 } );
      let b = json!( { "alpha" : 1, "beta" : 2 } );
      let key_a = generate_cache_key( "acme", "/v1/widgets", &a, "GET", "v1" );
      let key_b = generate_cache_key( "acme", "/v1/widgets", &b, "GET", "v1" );
      assert_eq!( key_a, key_b );
    }

    #[ test ]
    fn key_is_order_independent_across_nested_objects()
    {
      let a = json!( { "outer" : { "y" : 2, "x" : 1 }, "list" : [ 1, 2, 3 ] } );
      let b = json!( { "list" : [ 1, 2, 3 ], "outer" : { "x" : 1, "y" : 2 } } );
      let key_a = generate_cache_key( "acme", "/v1/widgets", &a, "GET", "v1" );
      let key_b = generate_cache_key( "acme", "/v1/widgets", &b, "GET", "v1" );
      assert_eq!( key_a, key_b );
    }

    #[ test ]
    fn array_order_is_significant()
    {
      let a = json!( { "list" : [ 1, 2, 3 ] } );
      let b = json!( { "list" : [ 3, 2, 1 ] } );
      let key_a = generate_cache_key( "acme", "/v1/widgets", &a, "GET", "v1" );
      let key_b = generate_cache_key( "acme", "/v1/widgets", &b, "GET", "v1" );
      assert_ne!( key_a, key_b );
    }

    #[ test ]
    fn different_client_or_endpoint_changes_the_key()
    {
      let params = json!( { "a" : 1 } );
      let base = generate_cache_key( "acme", "/v1/widgets", &params, "GET", "v1" );
      let other_client = generate_cache_key( "other", "/v1/widgets", &params, "GET", "v1" );
      let other_endpoint = generate_cache_key( "acme", "/v1/gadgets", &params, "GET", "v1" );
      assert_ne!( base, other_client );
      assert_ne!( base, other_endpoint );
    }
  }
}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  exposed use
  {
    generate_cache_key,
    canonical_json,
  };
}

#[ cfg( not( feature = "enabled" ) ) ]
crate::mod_interface!
{
}
