use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use color_eyre::eyre::Result;
use tracing::{info, warn};

use crate::system::process::WindowMetadata;

#[cfg(unix)]
mod hyprland;

#[cfg(unix)]
pub use hyprland::HyprlandIpc;

/// Supplies window placement keyed by owning PID.
pub trait WindowSource: Send + Sync {
    fn list_window_metadata(&self) -> Result<HashMap<u32, WindowMetadata>>;
}

/// Picks the Hyprland source when an instance is running, otherwise
/// [`NoWindows`].
pub fn detect() -> Arc<dyn WindowSource> {
    #[cfg(unix)]
    if let Some(ipc) = HyprlandIpc::from_env() {
        info!(socket = %ipc.socket().display(), "using hyprland window source");
        return Arc::new(ipc);
    }
    warn!("hyprland not detected; window metadata disabled");
    Arc::new(NoWindows)
}

/// Used when no window manager is reachable.
pub struct NoWindows;

impl WindowSource for NoWindows {
    fn list_window_metadata(&self) -> Result<HashMap<u32, WindowMetadata>> {
        Ok(HashMap::new())
    }
}

/// Fixed window list, replaceable at runtime.
#[derive(Default)]
pub struct StaticWindows {
    windows: RwLock<HashMap<u32, WindowMetadata>>,
    fail: RwLock<bool>,
}

impl StaticWindows {
    pub fn new(windows: HashMap<u32, WindowMetadata>) -> Self {
        Self {
            windows: RwLock::new(windows),
            fail: RwLock::new(false),
        }
    }

    pub fn set(&self, windows: HashMap<u32, WindowMetadata>) {
        if let Ok(mut current) = self.windows.write() {
            *current = windows;
        }
    }

    /// Makes subsequent listings fail, as an unreachable compositor would.
    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut fail) = self.fail.write() {
            *fail = unreachable;
        }
    }
}

impl WindowSource for StaticWindows {
    fn list_window_metadata(&self) -> Result<HashMap<u32, WindowMetadata>> {
        if self.fail.read().map(|f| *f).unwrap_or(false) {
            return Err(color_eyre::eyre::eyre!("window manager unreachable"));
        }
        Ok(self.windows.read().map(|w| w.clone()).unwrap_or_default())
    }
}
