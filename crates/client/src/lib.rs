pub mod circuit_breaker;
pub mod http;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry};
pub use http::{FetchResult, HttpClient};
