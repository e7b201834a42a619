//! Single-flight cache of loaded model backends.
//!
//! Loading an ONNX session is slow and fallible. The first caller for a model id becomes the
//! loader; concurrent callers block on a condvar until the load settles. Failed loads are
//! remembered so that a missing model is reported once instead of being retried per call.

use crate::error::{EmbeddingError, Result};
use crate::manifest::ModelId;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

struct LoadState<B> {
    done: bool,
    backend: Option<Arc<B>>,
    error: Option<String>,
}

pub(crate) struct LoadWaiter<B> {
    state: Arc<(Mutex<LoadState<B>>, Condvar)>,
}

impl<B> Clone for LoadWaiter<B> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<B> LoadWaiter<B> {
    fn new() -> Self {
        Self {
            state: Arc::new((
                Mutex::new(LoadState {
                    done: false,
                    backend: None,
                    error: None,
                }),
                Condvar::new(),
            )),
        }
    }

    fn settle(&self, backend: Option<Arc<B>>, error: Option<String>) {
        let (lock, cv) = &*self.state;
        {
            let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            guard.done = true;
            guard.backend = backend;
            guard.error = error;
        }
        cv.notify_all();
    }

    fn wait(&self) -> Result<Arc<B>> {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !guard.done {
            guard = cv.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        if let Some(backend) = &guard.backend {
            return Ok(backend.clone());
        }
        Err(EmbeddingError::ModelLoad(
            guard
                .error
                .clone()
                .unwrap_or_else(|| "Unknown backend load error".to_string()),
        ))
    }
}

enum BackendEntry<B> {
    Ready(Arc<B>),
    Loading(LoadWaiter<B>),
    Failed(String),
}

pub(crate) struct BackendCache<B> {
    entries: HashMap<ModelId, BackendEntry<B>>,
}

impl<B> Default for BackendCache<B> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<B> BackendCache<B> {
    /// Returns the backend for `id`, running `load` at most once per process for that id.
    pub(crate) fn get_or_load(
        cache: &Mutex<Self>,
        id: &ModelId,
        load: impl FnOnce() -> Result<B>,
    ) -> Result<Arc<B>> {
        enum Lookup<B> {
            Wait(LoadWaiter<B>),
            Load(LoadWaiter<B>),
        }

        let lookup = {
            let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.entries.get(id) {
                Some(BackendEntry::Ready(backend)) => return Ok(backend.clone()),
                Some(BackendEntry::Failed(reason)) => {
                    return Err(EmbeddingError::ModelLoad(reason.clone()))
                }
                Some(BackendEntry::Loading(waiter)) => Lookup::Wait(waiter.clone()),
                None => {
                    let waiter = LoadWaiter::new();
                    guard
                        .entries
                        .insert(id.clone(), BackendEntry::Loading(waiter.clone()));
                    Lookup::Load(waiter)
                }
            }
        };

        match lookup {
            Lookup::Wait(waiter) => waiter.wait(),
            Lookup::Load(waiter) => match load() {
                Ok(backend) => {
                    let backend = Arc::new(backend);
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries
                        .insert(id.clone(), BackendEntry::Ready(backend.clone()));
                    waiter.settle(Some(backend.clone()), None);
                    Ok(backend)
                }
                Err(err) => {
                    let reason = err.to_string();
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries
                        .insert(id.clone(), BackendEntry::Failed(reason.clone()));
                    waiter.settle(None, Some(reason));
                    Err(err)
                }
            },
        }
    }
}
