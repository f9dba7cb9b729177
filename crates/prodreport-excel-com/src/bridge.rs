//! Subprocess management and JSON IPC for the bridge process.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use excel_com_protocol::{Command as BridgeCommand, Request, Response, ResponseData, ResponseResult};
use tracing::{debug, trace, warn};

/// Errors from the Excel COM bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{command} failed in bridge: {message}")]
    Command { command: String, message: String },

    #[error("Unexpected response data for {0}")]
    UnexpectedResponse(String),

    #[error("No response to {command} within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("WINE not found. Install WINE and ensure 'wine' is in PATH.")]
    WineNotFound,

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),
}

/// Configuration for the Excel COM bridge.
#[derive(Debug, Clone)]
pub struct ExcelBridgeConfig {
    /// Path to the `excel-com-bridge.exe` Windows executable.
    /// If None, will search in common locations relative to the current binary.
    pub bridge_exe_path: Option<PathBuf>,

    /// Run the bridge under WINE. Defaults to true everywhere but Windows.
    pub use_wine: bool,

    /// Path to the WINE executable. Defaults to "wine".
    pub wine_path: PathBuf,

    /// Optional WINEPREFIX to use (for isolating the WINE environment).
    pub wine_prefix: Option<PathBuf>,

    /// Timeout for waiting for bridge responses.
    pub timeout: Duration,
}

impl Default for ExcelBridgeConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            use_wine: !cfg!(windows),
            wine_path: PathBuf::from("wine"),
            wine_prefix: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// The main handle for communicating with the Excel COM bridge.
///
/// This manages the subprocess lifecycle. The child is killed when the
/// handle is dropped without a clean [`shutdown`](Self::shutdown).
pub struct ExcelBridge {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    responses: Mutex<Receiver<std::io::Result<String>>>,
    next_id: AtomicU64,
    timeout: Duration,
    use_wine: bool,
}

impl ExcelBridge {
    /// Start the bridge process and initialize Excel.
    pub fn start(config: &ExcelBridgeConfig) -> Result<Self, BridgeError> {
        let exe_path = config
            .bridge_exe_path
            .clone()
            .unwrap_or_else(find_bridge_exe);

        if !exe_path.exists() {
            return Err(BridgeError::BridgeExeNotFound(
                exe_path.display().to_string(),
            ));
        }

        let mut cmd = if config.use_wine {
            let mut cmd = std::process::Command::new(&config.wine_path);
            if let Some(prefix) = &config.wine_prefix {
                cmd.env("WINEPREFIX", prefix);
            }
            cmd.arg(&exe_path);
            cmd
        } else {
            std::process::Command::new(&exe_path)
        };

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        debug!(exe = %exe_path.display(), wine = config.use_wine, "spawning bridge");
        let mut child = cmd.spawn().map_err(|e| {
            if config.use_wine && e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::WineNotFound
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(BridgeError::NotRunning);
        };

        // Lines are read on a separate thread so a hung Excel turns into a
        // timeout instead of blocking the pipeline forever.
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("excel-bridge-stdout".into())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })?;

        let bridge = Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            responses: Mutex::new(rx),
            next_id: AtomicU64::new(1),
            timeout: config.timeout,
            use_wine: config.use_wine,
        };

        // Initialize COM and Excel
        bridge.send_command(BridgeCommand::Init)?;

        Ok(bridge)
    }

    /// Whether paths must be translated to WINE drive paths
    pub fn uses_wine(&self) -> bool {
        self.use_wine
    }

    /// Send a command to the bridge and wait for the response.
    pub fn send_command(&self, command: BridgeCommand) -> Result<Option<ResponseData>, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = command.name();

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;
        trace!(%json, "bridge request");

        // Send the request
        {
            let mut stdin = self.stdin.lock().map_err(|_| BridgeError::NotRunning)?;
            writeln!(stdin, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
            stdin
                .flush()
                .map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        }

        // Read until the matching response arrives
        let deadline = Instant::now() + self.timeout;
        let responses = self.responses.lock().map_err(|_| BridgeError::NotRunning)?;
        let response: Response = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match responses.recv_timeout(remaining) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => return Err(BridgeError::ReadFailed(e.to_string())),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BridgeError::Timeout {
                        command: name.to_string(),
                        timeout: self.timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::NotRunning),
            };

            let response: Response = serde_json::from_str(line.trim())?;
            if response.id == id {
                break response;
            }
            warn!(expected = id, got = response.id, "discarding stale bridge response");
        };

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(BridgeError::Command {
                command: name.to_string(),
                message,
            }),
        }
    }

    /// Shut down the bridge: close all workbooks, quit Excel, and wait for
    /// the process to exit (killing it if it does not within the timeout).
    pub fn shutdown(self) -> Result<(), BridgeError> {
        let result = self.send_command(BridgeCommand::Shutdown).map(|_| ());

        let deadline = Instant::now() + self.timeout;
        let mut child = self.child.lock().map_err(|_| BridgeError::NotRunning)?;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(100)),
                _ => {
                    warn!("bridge did not exit after shutdown, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    break;
                }
            }
        }

        result
    }

    /// Kill the bridge process without a shutdown handshake
    pub fn kill(&self) {
        if let Ok(mut child) = self.child.lock() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl Drop for ExcelBridge {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Path of a file as the bridge process sees it
pub fn host_path(path: &Path, use_wine: bool) -> String {
    if use_wine {
        linux_to_wine_path(path)
    } else {
        absolute(path).display().to_string()
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/file.xlsx` becomes `Z:\home\user\file.xlsx`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    // WINE maps the root filesystem to Z:
    format!("Z:{}", absolute(linux_path).display()).replace('/', "\\")
}

/// Attempt to locate the bridge exe relative to the current executable or in common paths.
fn find_bridge_exe() -> PathBuf {
    // Check next to the current executable
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join("excel-com-bridge.exe");
        if candidate.exists() {
            return candidate;
        }
    }

    for profile in ["release", "debug"] {
        let target_path =
            PathBuf::from(format!("target/x86_64-pc-windows-gnu/{profile}/excel-com-bridge.exe"));
        if target_path.exists() {
            return target_path;
        }
    }

    // Default: assume it's in the current directory
    PathBuf::from("excel-com-bridge.exe")
}
