//! Credential handling for upstream clients
//!
//! A client descriptor (`api-cache.apis.<client>` in configuration) carries
//! either an API key or a login/password pair. Either way the value must
//! never be logged in full — `Debug` redacts it, matching the pattern the
//! error log's `log_error` uses to scrub `Authorization` headers.

mod private
{
  use error_tools::untyped::Result;

  /// Upstream credentials for one client
  #[ derive( Clone ) ]
  pub enum Secret
  {
    /// Single bearer/API key credential
    ApiKey( String ),
    /// Basic-auth style login/password pair
    LoginPassword
    {
      /// Account login
      login : String,
      /// Account password
      password : String,
    },
  }

  impl std::fmt::Debug for Secret
  {
    fn fmt( &self, f : &mut std::fmt::Formatter< '_ > ) -> std::fmt::Result
    {
      match self
      {
        Secret::ApiKey( _ ) => f.debug_tuple( "ApiKey" ).field( &"< REDACTED >" ).finish(),
        Secret::LoginPassword { login, .. } =>
          f.debug_struct( "LoginPassword" )
            .field( "login", login )
            .field( "password", &"< REDACTED >" )
            .finish(),
      }
    }
  }

  impl Secret
  {
    /// Create an API-key credential
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty
    pub fn api_key( key : String ) -> Result< Self >
    {
      if key.trim().is_empty()
      {
        return Err( error_tools::Error::msg( "API key cannot be empty" ) );
      }
      Ok( Self::ApiKey( key ) )
    }

    /// Create a login/password credential
    ///
    /// # Errors
    ///
    /// Returns an error if either field is empty
    pub fn login_password( login : String, password : String ) -> Result< Self >
    {
      if login.trim().is_empty() || password.trim().is_empty()
      {
        return Err( error_tools::Error::msg( "login and password must both be non-empty" ) );
      }
      Ok( Self::LoginPassword { login, password } )
    }

    /// Load an API key from an environment variable
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the key is invalid
    pub fn load_from_env( env_var : &str ) -> Result< Self >
    {
      let key = std::env::var( env_var )
        .map_err( | e | error_tools::Error::msg( format!( "missing environment variable '{env_var}' : {e}" ) ) )?;
      Self::api_key( key )
    }

    /// Build the `Authorization` header value a base client attaches to
    /// requests (`getAuthHeaders()` in the spec)
    #[ must_use ]
    pub fn auth_header_value( &self ) -> String
    {
      match self
      {
        Secret::ApiKey( key ) => format!( "Bearer {key}" ),
        Secret::LoginPassword { login, password } =>
        {
          use base64::Engine;
          let raw = format!( "{login}:{password}" );
          format!( "Basic {}", base64::engine::general_purpose::STANDARD.encode( raw ) )
        },
      }
    }
  }
}

crate::mod_interface!
{
  exposed use Secret;
}
