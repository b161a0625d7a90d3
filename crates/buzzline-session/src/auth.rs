//! Host authentication.
//!
//! Issuing host credentials happens elsewhere; this layer only answers
//! "does this token make the connection a host?".

use crate::SessionError;

/// Validates a host credential presented in the `hello` event.
///
/// Connections that present no token are participants and never reach
/// the authenticator.
///
/// ```rust
/// use buzzline_session::{HostAuthenticator, SessionError};
///
/// struct AllowList(Vec<String>);
///
/// impl HostAuthenticator for AllowList {
///     async fn authenticate(&self, token: &str) -> Result<(), SessionError> {
///         if self.0.iter().any(|t| t == token) {
///             Ok(())
///         } else {
///             Err(SessionError::AuthFailed("unknown host token".into()))
///         }
///     }
/// }
/// ```
pub trait HostAuthenticator: Send + Sync + 'static {
    /// `Ok(())` grants host rights; an error rejects the connection.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// Accepts a single shared PIN.
#[derive(Debug, Clone)]
pub struct PinAuthenticator {
    pin: String,
}

impl PinAuthenticator {
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }
}

impl HostAuthenticator for PinAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<(), SessionError> {
        // constant-time comparison
        let expected = self.pin.as_bytes();
        let given = token.as_bytes();
        let diff = expected
            .iter()
            .zip(given.iter())
            .fold(expected.len() ^ given.len(), |acc, (a, b)| acc | usize::from(a ^ b));
        if diff == 0 {
            Ok(())
        } else {
            Err(SessionError::AuthFailed("invalid host pin".into()))
        }
    }
}
