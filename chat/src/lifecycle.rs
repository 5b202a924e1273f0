//! Ties store listeners to screen visibility.
//!
//! A [`Listener`] is either stopped or holds exactly one live handle. The
//! handle is dropped on stop, which detaches it from the store before `stop`
//! returns. Nothing is buffered while stopped; starting again begins with a
//! fresh snapshot.

use thiserror::Error;
use tracing::trace;

/// Something that can be listened to, producing a live handle.
pub trait Listen {
    type Handle;

    fn listen(&self) -> Self::Handle;
}

impl<F, H> Listen for F
where
    F: Fn() -> H,
{
    type Handle = H;

    fn listen(&self) -> H {
        self()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("listener is already listening")]
    AlreadyListening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    Visible,
    Hidden,
    Destroyed,
}

pub struct Listener<S: Listen> {
    source: S,
    handle: Option<S::Handle>,
}

impl<S: Listen> Listener<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            handle: None,
        }
    }

    pub fn start(&mut self) -> Result<&mut S::Handle, LifecycleError> {
        if self.handle.is_some() {
            return Err(LifecycleError::AlreadyListening);
        }
        trace!("listener started");
        Ok(self.handle.insert(self.source.listen()))
    }

    /// Drop the live handle, if any.
    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            trace!("listener stopped");
        }
    }

    pub fn state(&self) -> ListenerState {
        if self.handle.is_some() {
            ListenerState::Listening
        } else {
            ListenerState::Stopped
        }
    }

    pub fn handle(&self) -> Option<&S::Handle> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut S::Handle> {
        self.handle.as_mut()
    }

    /// Follow a visibility change. Becoming visible while already listening
    /// keeps the current handle.
    pub fn apply(&mut self, event: ScreenEvent) -> ListenerState {
        match event {
            ScreenEvent::Visible => {
                if self.handle.is_none() {
                    let _ = self.start();
                }
            }
            ScreenEvent::Hidden | ScreenEvent::Destroyed => self.stop(),
        }
        self.state()
    }
}
