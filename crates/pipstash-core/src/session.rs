use crate::account::Identity;

/// The process's notion of who is signed in. At most one identity at a
/// time; privileged operations go through [`Session::require`].
#[derive(Debug, Default)]
pub struct Session {
    active: Option<Identity>,
}

/// Returned when a privileged operation runs without an active identity.
#[derive(Debug, thiserror::Error)]
#[error("not signed in")]
pub struct NotAuthenticated;

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticate(&mut self, identity: Identity) {
        self.active = Some(identity);
    }

    /// Clears the active identity. Idempotent.
    pub fn clear(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<&Identity> {
        self.active.as_ref()
    }

    pub fn require(&self) -> Result<&Identity, NotAuthenticated> {
        self.active.as_ref().ok_or(NotAuthenticated)
    }
}
