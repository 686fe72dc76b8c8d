//! Base HTTP client (C6)
//!
//! The cache → rate-limit → dispatch → store pipeline every upstream
//! client subclass is a thin facade over.

mod private {}

crate::mod_interface!
{
  layer types;
  layer implementation;
}
