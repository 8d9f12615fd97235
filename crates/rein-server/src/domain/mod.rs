//! Domain layer for rein-server.
//!
//! Pure state and rules with no networking or OS access:
//!
//! - [`config`]: startup settings
//! - [`runtime_config`]: settings the operator can change live, and their validation
//! - [`session`]: tokens, PIN and pairing requests
//! - [`connection`]: admission state, duplicate suppression, token-touch throttle
//!
//! Everything here takes time as an explicit `Instant` argument where it
//! matters, so the tests never sleep.

pub mod config;
pub mod connection;
pub mod runtime_config;
pub mod session;

pub use config::ServerConfig;
pub use connection::{Admission, AdmissionState, DuplicateFilter, TouchThrottle};
pub use runtime_config::{validate_update, ConfigError, RuntimeConfig};
pub use session::{generate_pin, SessionError, SessionPolicy, SessionRegistry};
