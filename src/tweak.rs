// Per-tunable session handle for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{Backend, Operation};
use crate::dispatch::Dispatcher;
use crate::session::{Phase, TweakSession};
use crate::state::{TunableSchema, TweakState};
use crate::view::ZramView;

#[derive(Error, Debug)]
pub enum TweakError {
    #[error("Tweak {0} is not loaded")]
    NotLoaded(String),
    #[error("Failed to {op} {tunable}: {message}")]
    Rejected {
        tunable: String,
        op: Operation,
        message: String,
    },
    #[error("{tunable}: {request} response superseded by a newer request")]
    Superseded { tunable: String, request: Request },
    #[error("Unknown tweak: {0}")]
    UnknownTweak(String),
}

pub type Result<T> = std::result::Result<T, TweakError>;

/// Handle requests that take a generation ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Load,
    Save,
    Apply,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Request::Load => "load",
            Request::Save => "save",
            Request::Apply => "apply",
        })
    }
}

/// Lifecycle of a tunable as seen by its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakStatus {
    Unloaded,
    Loaded { phase: Phase, applied: bool },
}

#[derive(Debug, Default)]
struct Inner {
    session: Option<TweakSession>,
    /// Bumped by every load, save and apply. A backend response is only
    /// committed if no newer request started while it was in flight.
    generation: u64,
}

/// Owns the session of one tunable and serialises every mutation of it.
///
/// The lock is never held across a backend call: each request takes a
/// generation ticket, releases the lock, awaits the backend, then commits
/// only if its ticket is still the latest.
#[derive(Debug)]
pub struct TweakHandle<B> {
    schema: &'static TunableSchema,
    default: TweakState,
    dispatcher: Dispatcher<B>,
    inner: Mutex<Inner>,
}

impl<B: Backend> TweakHandle<B> {
    pub fn new(schema: &'static TunableSchema, default: TweakState, backend: Arc<B>) -> Self {
        Self {
            schema,
            default,
            dispatcher: Dispatcher::new(backend),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn id(&self) -> &'static str {
        self.schema.id
    }

    pub fn schema(&self) -> &'static TunableSchema {
        self.schema
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticket(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.generation
    }

    /// Commit `f` against the session if `ticket` is still current.
    fn commit<T>(
        &self,
        request: Request,
        ticket: u64,
        f: impl FnOnce(&mut Inner) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.lock();
        if inner.generation != ticket {
            debug!(
                "{}: discarding {} response (request {}, latest {})",
                self.id(),
                request,
                ticket,
                inner.generation
            );
            return Err(TweakError::Superseded {
                tunable: self.id().to_string(),
                request,
            });
        }
        f(&mut inner)
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut TweakSession) -> T) -> Result<T> {
        let mut inner = self.lock();
        inner
            .session
            .as_mut()
            .map(f)
            .ok_or_else(|| TweakError::NotLoaded(self.id().to_string()))
    }

    /// Query the backend and reconcile a fresh session. Backend failures
    /// degrade to empty states; the only error is being superseded.
    pub async fn load(&self) -> Result<()> {
        let ticket = self.ticket();
        let loaded = self.dispatcher.load(self.id()).await;
        let session = TweakSession::reconcile(self.schema, loaded, &self.default);
        self.commit(Request::Load, ticket, |inner| {
            info!("{}: loaded, pending {}", self.id(), session.pending());
            inner.session = Some(session);
            Ok(())
        })
    }

    pub fn status(&self) -> TweakStatus {
        match &self.lock().session {
            None => TweakStatus::Unloaded,
            Some(session) => TweakStatus::Loaded {
                phase: session.phase(),
                applied: session.applied(),
            },
        }
    }

    /// Copy of the whole session.
    pub fn session(&self) -> Result<TweakSession> {
        self.with_session(|s| s.clone())
    }

    /// Snapshot of the edit buffer.
    pub fn get_state(&self) -> Result<TweakState> {
        self.with_session(|s| s.pending().clone())
    }

    /// Merge `partial` into the edit buffer. Returns the pending-changes flag.
    pub fn set_state(&self, partial: &TweakState) -> Result<bool> {
        self.with_session(|s| {
            s.merge_pending(partial);
            s.has_pending_changes()
        })
    }

    /// Set one field of the edit buffer. Returns the pending-changes flag.
    pub fn set_field(&self, field: &str, value: &str) -> Result<bool> {
        self.with_session(|s| {
            s.set_field(field, value);
            s.has_pending_changes()
        })
    }

    pub fn has_pending_changes(&self) -> Result<bool> {
        self.with_session(|s| s.has_pending_changes())
    }

    /// Render model of the current session.
    pub fn render(&self) -> Result<ZramView> {
        self.with_session(|s| ZramView::build(s))
    }

    /// Persist the edit buffer. On success `saved` and `reference` become
    /// the snapshot that was sent.
    pub async fn save(&self) -> Result<()> {
        let snapshot = self.get_state()?;
        let ticket = self.ticket();
        self.dispatcher.save(self.schema, &snapshot).await?;
        self.commit(Request::Save, ticket, |inner| {
            let session = inner
                .session
                .as_mut()
                .ok_or_else(|| TweakError::NotLoaded(self.id().to_string()))?;
            session.commit_saved(snapshot);
            Ok(())
        })
    }

    /// Push the edit buffer to the live system. On success `current` is
    /// refreshed; `saved` and `reference` are untouched.
    pub async fn apply(&self) -> Result<()> {
        let snapshot = self.get_state()?;
        let ticket = self.ticket();
        let current = self.dispatcher.apply(self.schema, &snapshot).await?;
        self.commit(Request::Apply, ticket, |inner| {
            let session = inner
                .session
                .as_mut()
                .ok_or_else(|| TweakError::NotLoaded(self.id().to_string()))?;
            session.commit_applied(current);
            Ok(())
        })
    }
}
