//! Launching the node binary: `init`, start, log forwarding, exit
//! supervision and kill.

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::node::NodeSpec;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long log forwarders may keep draining after their process is gone.
const FORWARDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const STDOUT_TAG: &str = "stdout";
const STDERR_TAG: &str = "stderr";

/// The two log files owned by one node.
#[derive(Debug)]
pub struct NodeLogs {
    /// Init output followed by the node's stdout.
    pub out: File,
    /// The node's stderr.
    pub err: File,
}

impl NodeLogs {
    /// Create (truncating) the node's log and error files.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if either file cannot be created.
    pub async fn create(spec: &NodeSpec) -> Result<Self> {
        let out = File::create(&spec.log_file).await?;
        let err = File::create(&spec.err_file).await?;
        Ok(Self { out, err })
    }
}

/// How a node process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own before teardown.
    Exited(ExitStatus),
    /// The process was killed by the harness.
    Killed(ExitStatus),
    /// The process had already been killed by an earlier call.
    AlreadyStopped,
}

/// Runs the node binary.
#[derive(Debug, Clone)]
pub struct Launcher {
    binary: PathBuf,
    node_config: PathBuf,
    genesis: PathBuf,
}

impl Launcher {
    /// Create a launcher from the harness configuration.
    #[must_use]
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            node_config: config.node_config_path.clone(),
            genesis: config.genesis_path.clone(),
        }
    }

    /// Arguments of the `init` invocation for `spec`.
    #[must_use]
    pub fn init_args(&self, spec: &NodeSpec) -> Vec<OsString> {
        vec![
            "init".into(),
            "--config".into(),
            self.node_config.clone().into(),
            "--basepath".into(),
            spec.base_path.clone().into(),
            "--genesis".into(),
            self.genesis.clone().into(),
            "--force".into(),
        ]
    }

    /// Arguments of the long-running invocation for `spec`.
    #[must_use]
    pub fn start_args(&self, spec: &NodeSpec, bootnode: Option<&str>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--port".into(),
            spec.port.to_string().into(),
            "--config".into(),
            self.node_config.clone().into(),
            "--key".into(),
            spec.name.clone().into(),
            "--basepath".into(),
            spec.base_path.clone().into(),
            "--rpcport".into(),
            spec.rpc_port.to_string().into(),
            "--rpc".into(),
        ];
        if let Some(addr) = bootnode {
            args.push("--bootnodes".into());
            args.push(addr.into());
        }
        args
    }

    /// Initialize the node's state, writing the init output to `log`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Init` if the binary cannot be run or exits non-zero,
    /// and `Error::Io` if the output cannot be written.
    pub async fn init(&self, spec: &NodeSpec, log: &mut File) -> Result<()> {
        debug!(node = %spec.name, binary = %self.binary.display(), "initializing node");

        let output = Command::new(&self.binary)
            .args(self.init_args(spec))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Init {
                node: spec.name.clone(),
                reason: e.to_string(),
            })?;

        log.write_all(&output.stdout).await?;
        log.write_all(&output.stderr).await?;
        log.flush().await?;

        if !output.status.success() {
            return Err(Error::Init {
                node: spec.name.clone(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        info!("initialized node {}", spec.name);
        Ok(())
    }

    /// Start the node and forward its output to `logs`.
    ///
    /// Returns as soon as the process is spawned; readiness is the caller's
    /// concern.
    ///
    /// # Errors
    ///
    /// Returns `Error::Startup` if the process cannot be spawned.
    pub fn start(
        &self,
        spec: &NodeSpec,
        bootnode: Option<&str>,
        logs: NodeLogs,
    ) -> Result<NodeProcess> {
        let args = self.start_args(spec, bootnode);
        info!(node = %spec.name, ?args, "starting node");

        let startup_err = |reason: String| Error::Startup {
            node: spec.name.clone(),
            reason,
        };

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| startup_err(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| startup_err("missing stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| startup_err("missing stderr pipe".to_string()))?;

        let forward_stop = CancellationToken::new();
        let forwarders = vec![
            spawn_forwarder(
                stdout,
                logs.out,
                forward_stop.clone(),
                spec.name.clone(),
                STDOUT_TAG,
            ),
            spawn_forwarder(
                stderr,
                logs.err,
                forward_stop.clone(),
                spec.name.clone(),
                STDERR_TAG,
            ),
        ];

        Ok(NodeProcess {
            pid: child.id(),
            spec: spec.clone(),
            child: Some(child),
            supervisor: None,
            shutdown: CancellationToken::new(),
            forwarders,
            forward_stop,
            stopped: false,
        })
    }

    /// [`Launcher::init`] followed by [`Launcher::start`].
    ///
    /// # Errors
    ///
    /// See [`Launcher::init`] and [`Launcher::start`].
    pub async fn init_and_start(
        &self,
        spec: &NodeSpec,
        bootnode: Option<&str>,
        mut logs: NodeLogs,
    ) -> Result<NodeProcess> {
        self.init(spec, &mut logs.out).await?;
        self.start(spec, bootnode, logs)
    }
}

/// A running node process and its background tasks.
#[derive(Debug)]
pub struct NodeProcess {
    spec: NodeSpec,
    pid: Option<u32>,
    /// Held here until [`NodeProcess::watch_exit`] hands it to the supervisor.
    child: Option<Child>,
    supervisor: Option<JoinHandle<io::Result<Termination>>>,
    shutdown: CancellationToken,
    forwarders: Vec<JoinHandle<io::Result<()>>>,
    forward_stop: CancellationToken,
    stopped: bool,
}

impl NodeProcess {
    /// The node this process runs.
    #[must_use]
    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// OS process id, if the process was still running when spawned.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the exit supervisor has seen the process end.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.supervisor.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Start reporting an unexpected exit of this process.
    ///
    /// Moves the child into a background task that logs a failure if the
    /// process ends before teardown and kills it when teardown begins.
    /// Calling this more than once has no effect.
    pub fn watch_exit(&mut self) {
        if let Some(child) = self.child.take() {
            let name = self.spec.name.clone();
            let shutdown = self.shutdown.clone();
            self.supervisor = Some(tokio::spawn(supervise(child, name, shutdown)));
        }
    }

    /// Kill the process, wait for it, and drain its log forwarders.
    ///
    /// Only the first call signals the process; later calls return
    /// [`Termination::AlreadyStopped`].
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the kill or wait; the caller decides whether
    /// it matters.
    pub async fn kill(&mut self) -> io::Result<Termination> {
        if self.stopped {
            return Ok(Termination::AlreadyStopped);
        }
        self.stopped = true;

        let result = if let Some(handle) = self.supervisor.take() {
            self.shutdown.cancel();
            handle.await.map_err(io::Error::other).and_then(|r| r)
        } else if let Some(mut child) = self.child.take() {
            terminate(&mut child).await.map(Termination::Killed)
        } else {
            Ok(Termination::AlreadyStopped)
        };

        self.drain_forwarders().await;
        result
    }

    async fn drain_forwarders(&mut self) {
        for mut handle in self.forwarders.drain(..) {
            let joined = match tokio::time::timeout(FORWARDER_DRAIN_TIMEOUT, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.forward_stop.cancel();
                    handle.await
                }
            };
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(node = %self.spec.name, "log forwarding failed: {e}"),
                Err(e) => warn!(node = %self.spec.name, "log forwarder panicked: {e}"),
            }
        }
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.forward_stop.cancel();
    }
}

async fn terminate(child: &mut Child) -> io::Result<ExitStatus> {
    child.start_kill()?;
    child.wait().await
}

async fn supervise(
    mut child: Child,
    name: String,
    shutdown: CancellationToken,
) -> io::Result<Termination> {
    tokio::select! {
        status = child.wait() => {
            let status = status?;
            if !status.success() {
                warn!("process {name} failed!!! {status}");
            } else {
                info!("process {name} exited");
            }
            Ok(Termination::Exited(status))
        }
        () = shutdown.cancelled() => {
            let status = terminate(&mut child).await?;
            debug!(node = %name, %status, "process killed");
            Ok(Termination::Killed(status))
        }
    }
}

fn spawn_forwarder<R>(
    mut stream: R,
    mut sink: File,
    stop: CancellationToken,
    node: String,
    tag: &'static str,
) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            copied = tokio::io::copy(&mut stream, &mut sink) => {
                let copied = copied?;
                debug!(%node, tag, bytes = copied, "output stream closed");
            }
            () = stop.cancelled() => {
                debug!(%node, tag, "output forwarding stopped");
            }
        }
        sink.flush().await
    })
}
