//! Per-connection bookkeeping for Buzzline.
//!
//! 1. **Host authentication**: deciding whether a connection may drive a
//!    room ([`HostAuthenticator`]).
//! 2. **Sessions**: which room and participant a connection is bound to
//!    ([`SessionManager`]).
//! 3. **Rate limiting**: a token bucket per connection ([`RateLimiter`]).
//!
//! ```text
//! Room layer (above)     routes events for a bound room
//!     ↕
//! Session layer (here)   identity and admission control per connection
//!     ↕
//! Protocol layer         RoomCode, PlayerId, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod limiter;
mod manager;
mod session;

pub use auth::{HostAuthenticator, PinAuthenticator};
pub use error::SessionError;
pub use limiter::RateLimiter;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig};
