pub mod error;
pub mod clock;
pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
