use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

const SESSION_MARKER: &str = "session";

/// Storage for the "credentials accepted this session" flag.
pub trait SessionStore: Send {
    fn is_flagged(&self) -> bool;

    fn set_flag(&self) -> Result<()>;
}

/// Keeps the flag as a marker file in a per-login-session directory.
#[derive(Debug, Clone)]
pub struct MarkerFileStore {
    dir: PathBuf,
}

impl MarkerFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_RUNTIME_DIR/kubedeck`, falling back to the system temp directory.
    pub fn discover() -> Self {
        let base = std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("kubedeck"))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(SESSION_MARKER)
    }
}

impl SessionStore for MarkerFileStore {
    fn is_flagged(&self) -> bool {
        self.marker_path().is_file()
    }

    fn set_flag(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create session dir {}", self.dir.display()))?;
        write_marker(&self.marker_path())
    }
}

fn write_marker(path: &Path) -> Result<()> {
    fs::write(path, b"true")
        .with_context(|| format!("failed to write session marker {}", path.display()))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    flag: AtomicBool,
}

impl MemoryStore {
    pub fn flagged() -> Self {
        Self {
            flag: AtomicBool::new(true),
        }
    }
}

impl SessionStore for MemoryStore {
    fn is_flagged(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn set_flag(&self) -> Result<()> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GateState {
    Locked,
    Unlocked,
}

/// Decides whether cluster views may load. Once unlocked it stays unlocked.
pub struct SessionGate {
    store: Box<dyn SessionStore>,
    state: GateState,
}

impl SessionGate {
    /// Reads the stored flag once; a flag left by an earlier upload opens the gate directly.
    pub fn open(store: Box<dyn SessionStore>) -> Self {
        let state = if store.is_flagged() {
            GateState::Unlocked
        } else {
            GateState::Locked
        };
        info!("session gate opened as {state:?}");
        Self { store, state }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Records an accepted credential upload. Returns `true` only on the Locked → Unlocked edge.
    pub fn unlock(&mut self) -> bool {
        if self.is_unlocked() {
            return false;
        }

        if let Err(error) = self.store.set_flag() {
            warn!("session flag not persisted: {error:#}");
        }
        self.state = GateState::Unlocked;
        info!("session gate unlocked");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{GateState, MarkerFileStore, MemoryStore, SessionGate, SessionStore};

    #[test]
    fn starts_locked_without_prior_flag() {
        let gate = SessionGate::open(Box::new(MemoryStore::default()));
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[test]
    fn prior_flag_opens_unlocked() {
        let gate = SessionGate::open(Box::new(MemoryStore::flagged()));
        assert_eq!(gate.state(), GateState::Unlocked);
    }

    #[test]
    fn unlock_fires_once() {
        let mut gate = SessionGate::open(Box::new(MemoryStore::default()));
        assert!(gate.unlock());
        assert!(!gate.unlock());
        assert!(gate.is_unlocked());
    }

    #[test]
    fn marker_file_round_trips_through_a_new_gate() {
        let dir = std::env::temp_dir().join(format!("kubedeck-session-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let store = MarkerFileStore::new(&dir);
        assert!(!store.is_flagged());

        let mut gate = SessionGate::open(Box::new(store.clone()));
        assert!(gate.unlock());
        assert!(store.marker_path().is_file());

        let reopened = SessionGate::open(Box::new(MarkerFileStore::new(&dir)));
        assert_eq!(reopened.state(), GateState::Unlocked);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
