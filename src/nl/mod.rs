//! Natural-language control: free text → LLM → scene commands.
//!
//! `NaturalLanguageRouter` classifies the request and talks to the chat
//! backend; `NaturalLanguageProcessor` applies the routed result through a
//! `SceneControl`.

pub mod openai;
pub mod params;
pub mod processor;
pub mod prompts;
pub mod router;
pub mod speech;

pub use openai::OpenAiBackend;
pub use params::SceneParameters;
pub use processor::{NaturalLanguageProcessor, ProcessError, ProcessOutcome, SceneControl};
pub use router::{
    determine_request_type, ChatBackend, ChatRequest, CodeSubtype, NaturalLanguageRouter, RequestKind,
    RouteResult, RouterError,
};
pub use speech::{SpeechError, SpeechTranslator, Transcript};

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a session state slot out of `Idle` for as long as it lives.
pub(crate) struct SessionGuard<'a, S: Copy + Default + PartialEq> {
    slot: &'a Mutex<S>,
}

impl<'a, S: Copy + Default + PartialEq> SessionGuard<'a, S> {
    /// Moves the slot from idle to `state`, or returns `None` if a session
    /// is already running.
    pub(crate) fn begin(slot: &'a Mutex<S>, state: S) -> Option<Self> {
        let mut current = lock(slot);
        if *current != S::default() {
            return None;
        }
        *current = state;
        Some(Self { slot })
    }

    pub(crate) fn advance(&self, state: S) {
        *lock(self.slot) = state;
    }
}

impl<S: Copy + Default + PartialEq> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        *lock(self.slot) = S::default();
    }
}

pub(crate) fn current<S: Copy>(slot: &Mutex<S>) -> S {
    *lock(slot)
}
