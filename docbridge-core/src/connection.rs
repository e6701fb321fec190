//! The single store handle shared by every operation.
//!
//! The handle starts absent, is published exactly once by the bootstrap component when
//! the outbound connection succeeds and is never reset. Operations read it without
//! locking.

use std::sync::OnceLock;

use crate::{
    backend::StoreBackend,
    error::{BridgeError, BridgeResult},
};

#[derive(Debug)]
pub struct ConnectionState<B: StoreBackend> {
    handle: OnceLock<B>,
}

impl<B: StoreBackend> ConnectionState<B> {
    /// Creates a state with no handle yet.
    pub fn new() -> Self {
        Self {
            handle: OnceLock::new(),
        }
    }

    /// Creates a state that already holds `backend`.
    pub fn connected(backend: B) -> Self {
        let state = Self::new();
        // A fresh OnceLock always accepts its first value.
        let _ = state.handle.set(backend);
        state
    }

    /// Publishes the store handle. Fails if one was already published.
    pub fn connect(&self, backend: B) -> BridgeResult<()> {
        self.handle
            .set(backend)
            .map_err(|_| BridgeError::AlreadyConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Returns the store handle, or [`BridgeError::NotConnected`] while it is absent.
    pub fn handle(&self) -> BridgeResult<&B> {
        self.handle.get().ok_or(BridgeError::NotConnected)
    }
}

impl<B: StoreBackend> Default for ConnectionState<B> {
    fn default() -> Self {
        Self::new()
    }
}
