use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::debug;

use super::WindowSource;
use crate::system::process::WindowMetadata;

const IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Client for Hyprland's request socket.
pub struct HyprlandIpc {
    socket: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Client {
    #[serde(default)]
    class: String,
    #[serde(default)]
    title: String,
    pid: i64,
    workspace: Workspace,
    monitor: MonitorRef,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MonitorRef {
    Id(i64),
    Name(String),
}

impl MonitorRef {
    fn into_label(self) -> String {
        match self {
            MonitorRef::Id(id) => id.to_string(),
            MonitorRef::Name(name) => name,
        }
    }
}

impl HyprlandIpc {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Locates the socket of the running Hyprland instance, if any.
    pub fn from_env() -> Option<Self> {
        let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok()?;
        let runtime = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        socket_candidates(runtime.as_deref(), &signature)
            .into_iter()
            .find(|p| p.exists())
            .map(Self::new)
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn request(&self, command: &str) -> Result<Vec<u8>> {
        let mut stream = UnixStream::connect(&self.socket)
            .wrap_err_with(|| format!("cannot connect to {}", self.socket.display()))?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        stream.write_all(command.as_bytes())?;
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply)?;
        Ok(reply)
    }
}

impl WindowSource for HyprlandIpc {
    fn list_window_metadata(&self) -> Result<HashMap<u32, WindowMetadata>> {
        let reply = self.request("j/clients")?;
        let windows = parse_clients(&reply)?;
        debug!(count = windows.len(), "hyprland clients");
        Ok(windows)
    }
}

fn socket_candidates(runtime_dir: Option<&Path>, signature: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(dir) = runtime_dir {
        candidates.push(dir.join("hypr").join(signature).join(".socket.sock"));
    }
    candidates.push(
        Path::new("/tmp/hypr")
            .join(signature)
            .join(".socket.sock"),
    );
    candidates
}

/// Decodes a `j/clients` reply. The first client seen for a PID wins.
fn parse_clients(reply: &[u8]) -> Result<HashMap<u32, WindowMetadata>> {
    let clients: Vec<Client> =
        serde_json::from_slice(reply).wrap_err("malformed hyprland clients reply")?;
    let mut windows = HashMap::with_capacity(clients.len());
    for client in clients {
        let Ok(pid) = u32::try_from(client.pid) else {
            continue;
        };
        if pid == 0 {
            continue;
        }
        windows.entry(pid).or_insert_with(|| WindowMetadata {
            workspace_id: client.workspace.id,
            workspace_name: client.workspace.name,
            monitor: client.monitor.into_label(),
            title: client.title,
            class: client.class,
        });
    }
    Ok(windows)
}
