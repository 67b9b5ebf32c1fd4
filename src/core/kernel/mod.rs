/// Transport kernel - source-agnostic plumbing shared by the protocol
/// transport and every catalog adapter.
///
/// The kernel contains no provider-specific logic:
///
/// - `RestClient` / `ReqwestRest`: unified HTTP interface with typed errors
/// - `BlowfishCodec`: the symmetric hex codec the radio protocol signs with
/// - `RateLimiter`: token-bucket admission plus exponential-backoff retry
pub mod cipher;
pub mod rate_limit;
pub mod rest;

// Re-export key types for convenience
pub use cipher::BlowfishCodec;
pub use rate_limit::RateLimiter;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
