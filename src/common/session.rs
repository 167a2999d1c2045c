use crate::common::error::{AppError, ServiceResult};
use crate::models::viewers::Viewer;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Who is signed in, passed explicitly to whatever acts on their behalf.
///
/// Listeners hold a [`watch::Receiver`]; dropping it is the deregistration.
#[derive(Clone)]
pub struct SessionContext {
    current: Arc<watch::Sender<Option<Viewer>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl SessionContext {
    pub fn signed_out() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            current: Arc::new(sender),
        }
    }

    pub fn signed_in(viewer: Viewer) -> Self {
        let session = Self::signed_out();
        session.sign_in(viewer);
        session
    }

    pub fn sign_in(&self, viewer: Viewer) {
        info!(user_id = viewer.user_id, "Viewer signed in");
        self.current.send_replace(Some(viewer));
    }

    pub fn sign_out(&self) {
        if let Some(viewer) = self.current.send_replace(None) {
            info!(user_id = viewer.user_id, "Viewer signed out");
        }
    }

    pub fn current(&self) -> Option<Viewer> {
        *self.current.borrow()
    }

    pub fn require_viewer(&self) -> ServiceResult<Viewer> {
        self.current().ok_or(AppError::SessionsSignedOut)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn changes(&self) -> watch::Receiver<Option<Viewer>> {
        self.current.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.current.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listeners_see_changes_and_deregister_on_drop() {
        let session = SessionContext::signed_out();
        assert!(matches!(session.require_viewer(), Err(AppError::SessionsSignedOut)));

        let mut changes = session.changes();
        assert_eq!(session.listener_count(), 1);

        session.sign_in(Viewer::new(7));
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), Some(Viewer::new(7)));
        assert!(session.is_authenticated());

        drop(changes);
        assert_eq!(session.listener_count(), 0);

        session.sign_out();
        assert_eq!(session.current(), None);
    }
}
