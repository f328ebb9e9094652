//! Remoting control plane for the rill reactor runtime.
//!
//! [`attach`] wires a remoting root into a running system and spawns one
//! registry driver child per directory board. From there the control plane
//! runs on plain messages: drivers bootstrap against the board, the root
//! publishes the local remoting channels, and gate events keep the routing
//! table converged.

#![deny(missing_docs)]

mod board;
mod directory;
mod root;

pub use board::DirectoryBoard;
pub use directory::directory_registry_reactions;
pub use root::remoting_root_reactions;

use rill_runtime::{ReactorConfig, ReactorRef, SpawnError, SystemHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle to a system's remoting control plane.
pub struct Remoting {
    root: ReactorRef,
    spurious: Arc<AtomicU64>,
}

impl Remoting {
    /// Reference to the remoting root reactor.
    pub fn root(&self) -> &ReactorRef {
        &self.root
    }

    /// Number of spurious messages the root has received.
    pub fn spurious_count(&self) -> u64 {
        self.spurious.load(Ordering::Relaxed)
    }
}

/// Spawns the remoting root and one registry driver per board.
///
/// Call after the system's remoting drivers are registered, so the channel
/// publication triggered by the bootstrap covers all of them.
pub fn attach(
    handle: &SystemHandle,
    boards: impl IntoIterator<Item = DirectoryBoard>,
) -> Result<Remoting, SpawnError> {
    let spurious = Arc::new(AtomicU64::new(0));
    let root = handle.spawn(
        ReactorConfig::named("remoting-root"),
        remoting_root_reactions(spurious.clone()),
    )?;
    for (index, board) in boards.into_iter().enumerate() {
        handle.spawn_child(
            &root,
            ReactorConfig::named(format!("registry-directory-{index}")),
            directory_registry_reactions(board),
        )?;
    }
    Ok(Remoting { root, spurious })
}
