//! Access-token caching.
//!
//! Tokens are minted by a caller-supplied `TokenSource` and cached per
//! `(delegate, scope set)` in a bounded TTL cache, so repeated requests for
//! the same identity and scopes reuse one token until it ages out.

mod cache;
mod token;

pub use cache::TtlCache;
pub use token::{AccessToken, TokenError, TokenGenerator, TokenKey, TokenSource};
