//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 access-token validation (and generation, for tooling
//!   and tests; production tokens are issued out-of-band).

pub mod jwt;
