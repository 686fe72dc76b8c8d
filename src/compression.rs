//! Symmetric body compression (C1)
//!
//! A byte-level transform gated by the per-client `compression_enabled`
//! flag. The flag is consulted per call, not cached: stored rows carry no
//! per-row format marker, so a client must not flip the flag on after
//! producing uncompressed rows without also resetting its cache table.

#[ cfg( feature = "compression" ) ]
mod private
{
  use std::io::{ Read, Write };
  use flate2::Compression;
  use flate2::read::GzDecoder;
  use flate2::write::GzEncoder;
  use crate::error::{ ApiCacheError, ApiCacheResult };

  /// Compression tuning, independent of the per-client enable flag
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub struct CompressionConfig
  {
    /// Compression level (0-9, where 0=none, 6=default, 9=best)
    pub level : u32,
  }

  impl CompressionConfig
  {
    /// Create new compression config with default settings
    ///
    /// Default : level=6 (balanced)
    #[ inline ]
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { level : 6 }
    }

    /// Set compression level (0-9)
    #[ inline ]
    #[ must_use ]
    pub fn with_level( mut self, level : u32 ) -> Self
    {
      self.level = level.min( 9 );
      self
    }
  }

  impl Default for CompressionConfig
  {
    #[ inline ]
    fn default() -> Self
    {
      Self::new()
    }
  }

  /// Compresses `bytes` for `client_name` if that client has compression
  /// enabled per `is_enabled`; otherwise returns the input unchanged.
  ///
  /// Empty input returns empty output in both modes.
  ///
  /// # Errors
  ///
  /// Returns [`ApiCacheError::Internal`] if the gzip writer fails.
  pub fn compress( is_enabled : bool, config : &CompressionConfig, bytes : &[ u8 ] ) -> ApiCacheResult< Vec< u8 > >
  {
    if !is_enabled || bytes.is_empty()
    {
      return Ok( bytes.to_vec() );
    }

    let mut encoder = GzEncoder::new( Vec::new(), Compression::new( config.level ) );
    encoder.write_all( bytes ).map_err( | e | ApiCacheError::Internal( e.to_string() ) )?;
    encoder.finish().map_err( | e | ApiCacheError::Internal( e.to_string() ) )
  }

  /// Decompresses `bytes` for `client_name` if that client has compression
  /// enabled; otherwise returns the input unchanged.
  ///
  /// # Errors
  ///
  /// Returns [`ApiCacheError::Decompression`] if `is_enabled` is true and
  /// the payload is not valid gzip data. Disabled clients never fail here.
  pub fn decompress( is_enabled : bool, bytes : &[ u8 ] ) -> ApiCacheResult< Vec< u8 > >
  {
    if !is_enabled || bytes.is_empty()
    {
      return Ok( bytes.to_vec() );
    }

    let mut decoder = GzDecoder::new( bytes );
    let mut decompressed = Vec::new();
    decoder.read_to_end( &mut decompressed )
      .map_err( | e | ApiCacheError::Decompression( e.to_string() ) )?;
    Ok( decompressed )
  }

  /// Check if data appears to be gzip-compressed, by magic number
  #[ inline ]
  #[ must_use ]
  pub fn is_gzip( data : &[ u8 ] ) -> bool
  {
    data.len() >= 2 && data[ 0 ] == 0x1f && data[ 1 ] == 0x8b
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn round_trip_when_enabled()
    {
      let config = CompressionConfig::new();
      let body = b"the quick brown fox jumps over the lazy dog".repeat( 8 );
      let compressed = compress( true, &config, &body ).unwrap();
      assert!( is_gzip( &compressed ) );
      let decompressed = decompress( true, &compressed ).unwrap();
      assert_eq!( decompressed, body );
    }

    #[ test ]
    fn identity_when_disabled()
    {
      let config = CompressionConfig::new();
      let body = b"hello world".to_vec();
      let compressed = compress( false, &config, &body ).unwrap();
      assert_eq!( compressed, body );
      let decompressed = decompress( false, &compressed ).unwrap();
      assert_eq!( decompressed, body );
    }

    #[ test ]
    fn empty_input_is_identity_in_both_modes()
    {
      let config = CompressionConfig::new();
      assert_eq!( compress( true, &config, &[] ).unwrap(), Vec::< u8 >::new() );
      assert_eq!( compress( false, &config, &[] ).unwrap(), Vec::< u8 >::new() );
      assert_eq!( decompress( true, &[] ).unwrap(), Vec::< u8 >::new() );
    }

    #[ test ]
    fn decompress_rejects_corrupt_payload_when_enabled()
    {
      let garbage = vec![ 1u8, 2, 3, 4, 5 ];
      let result = decompress( true, &garbage );
      assert!( matches!( result, Err( ApiCacheError::Decompression( _ ) ) ) );
    }
  }
}

#[ cfg( feature = "compression" ) ]
crate::mod_interface!
{
  exposed use
  {
    CompressionConfig,
    compress,
    decompress,
    is_gzip,
  };
}

#[ cfg( not( feature = "compression" ) ) ]
crate::mod_interface!
{
}
