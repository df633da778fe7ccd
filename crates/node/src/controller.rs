use std::{
    fmt::Display,
    fs::create_dir_all,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use dogetest_common::{
    fs::{clear_directory, remove_directory},
    polling::{Cancellation, poll},
};
use dogetest_config::NodeConfiguration;
use dogetest_rpc::{RpcConfiguration, RpcTransport};
use temp_dir::TempDir;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    Endpoint, LaunchRequest, NetworkReadiness, NodeError, NodeRuntime, RuntimeHandle,
    error::RuntimeExited, network::probe_port, runtimes::runtime_for,
};

static NODE_COUNT: AtomicU32 = AtomicU32::new(0);

/// The lifecycle states of a node session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    Created,
    Starting,
    WaitingForNetwork,
    WaitingForRpcReady,
    Running,
    Stopped,
}

impl Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::WaitingForNetwork => "waiting for the network endpoint",
            Self::WaitingForRpcReady => "waiting for the rpc interface",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(state)
    }
}

/// Owns one node session: starts the node through a [`NodeRuntime`], waits until its RPC
/// interface answers, and tears everything down again.
///
/// [`NodeController::stop`] runs on drop, so a session never outlives its controller.
pub struct NodeController {
    id: u32,
    configuration: NodeConfiguration,
    runtime: Box<dyn NodeRuntime>,
    state: NodeState,
    session: Option<SessionDirectory>,
    handle: Option<Box<dyn RuntimeHandle>>,
    endpoint: Option<Endpoint>,
    transport: Option<RpcTransport>,
    cancellation: Cancellation,
}

impl NodeController {
    /// Creates a controller using the runtime variant selected in the configuration.
    pub fn new(configuration: NodeConfiguration) -> Self {
        let runtime = runtime_for(&configuration);
        Self::with_boxed_runtime(configuration, runtime)
    }

    pub fn with_runtime(configuration: NodeConfiguration, runtime: impl NodeRuntime + 'static) -> Self {
        Self::with_boxed_runtime(configuration, Box::new(runtime))
    }

    fn with_boxed_runtime(configuration: NodeConfiguration, runtime: Box<dyn NodeRuntime>) -> Self {
        Self {
            id: NODE_COUNT.fetch_add(1, Ordering::SeqCst),
            configuration,
            runtime,
            state: NodeState::Created,
            session: None,
            handle: None,
            endpoint: None,
            transport: None,
            cancellation: Cancellation::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn configuration(&self) -> &NodeConfiguration {
        &self.configuration
    }

    /// The resolved RPC endpoint, once running.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// The transport bound to the node, once running.
    pub fn rpc(&self) -> Option<&RpcTransport> {
        self.transport.as_ref()
    }

    pub fn session_directory(&self) -> Option<&Path> {
        self.session.as_ref().map(SessionDirectory::root)
    }

    /// A handle that aborts an in-progress [`NodeController::start`] from another thread.
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Starts the node and blocks until its RPC interface answers.
    ///
    /// Only valid on a freshly created controller. On failure everything that was already set up
    /// is torn down again and the controller ends up [`NodeState::Stopped`].
    #[instrument(level = "info", skip_all, fields(node_id = self.id))]
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.state != NodeState::Created {
            return Err(NodeError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        match self.try_start() {
            Ok(()) => {
                self.transition(NodeState::Running);
                Ok(())
            }
            Err(error) => {
                error!(%error, "Failed to start the node, tearing down");
                if let Err(teardown_error) = self.stop() {
                    warn!(%teardown_error, "Teardown after the failed start also failed");
                }
                Err(error)
            }
        }
    }

    fn try_start(&mut self) -> Result<(), NodeError> {
        self.transition(NodeState::Starting);

        // Without credentials the node falls back to cookie authentication, which the transport
        // does not speak.
        if self.configuration.rpc_user.is_empty() || self.configuration.rpc_password.is_empty() {
            return Err(NodeError::InvalidConfiguration {
                reason: "the rpc user and password must not be empty".to_string(),
            });
        }

        let session = SessionDirectory::prepare(self.configuration.state_directory.as_deref())
            .map_err(NodeError::Session)?;
        let port = match self.configuration.port {
            Some(port) => port,
            None => probe_port(&self.configuration.host, self.configuration.port_range())?,
        };
        let request = LaunchRequest {
            host: self.configuration.host.clone(),
            port,
            network: self.configuration.network.clone(),
            session_directory: session.root().to_path_buf(),
            data_directory: session.data_directory(),
            logs_directory: session.logs_directory(),
            rpc_user: self.configuration.rpc_user.clone(),
            rpc_password: self.configuration.rpc_password.clone(),
        };
        self.session = Some(session);

        info!(port, "Launching the node");
        self.handle = Some(self.runtime.launch(&request).map_err(NodeError::Launch)?);

        self.transition(NodeState::WaitingForNetwork);
        self.wait_for_network()?;

        self.transition(NodeState::WaitingForRpcReady);
        let (endpoint, transport) = self.wait_for_rpc()?;
        info!(%endpoint, "Node is ready");
        self.endpoint = Some(endpoint);
        self.transport = Some(transport);

        Ok(())
    }

    fn wait_for_network(&mut self) -> Result<(), NodeError> {
        let phase = self.state;
        let readiness = self.runtime.network_readiness();
        let connect_timeout = self.configuration.connect_timeout();
        let Some(handle) = self.handle.as_deref_mut() else {
            return Err(NodeError::InvalidState {
                operation: "wait for",
                state: phase,
            });
        };

        poll(
            self.configuration.network_timeout(),
            self.configuration.poll_interval(),
            &self.cancellation,
            || {
                if !handle.is_running() {
                    return Err(RuntimeExited.into());
                }
                let ready = match &readiness {
                    NetworkReadiness::TcpConnect => match handle.resolved_endpoint() {
                        Ok(endpoint) => endpoint.is_reachable(connect_timeout),
                        Err(error) => {
                            debug!(?error, "Endpoint is not resolved yet");
                            false
                        }
                    },
                    NetworkReadiness::LogMarker(marker) => handle.logs_contain(marker)?,
                };
                Ok(if ready {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            },
        )
        .map_err(|error| NodeError::from_poll(error, phase))
    }

    /// Polls `getinfo` until it succeeds. The endpoint is resolved again on every attempt since a
    /// container's port mapping may only show up after the container started. Each request is cut
    /// off at the readiness deadline, so a hung node cannot stretch the wait.
    fn wait_for_rpc(&mut self) -> Result<(Endpoint, RpcTransport), NodeError> {
        let phase = self.state;
        let configuration = &self.configuration;
        let Some(handle) = self.handle.as_deref_mut() else {
            return Err(NodeError::InvalidState {
                operation: "wait for",
                state: phase,
            });
        };

        let mut bound: Option<(Endpoint, RpcTransport)> = None;
        let deadline = Instant::now() + configuration.rpc_timeout();
        poll(
            configuration.rpc_timeout(),
            configuration.poll_interval(),
            &self.cancellation,
            || {
                if !handle.is_running() {
                    return Err(RuntimeExited.into());
                }
                let endpoint = match handle.resolved_endpoint() {
                    Ok(endpoint) => endpoint,
                    Err(error) => {
                        debug!(?error, "Endpoint is not resolved yet");
                        return Ok(ControlFlow::Continue(()));
                    }
                };

                let transport = match bound.take() {
                    Some((current, transport)) if current == endpoint => transport,
                    _ => RpcTransport::new(
                        RpcConfiguration::for_endpoint(&endpoint.host, endpoint.port)
                            .with_credentials(
                                configuration.rpc_user.as_str(),
                                configuration.rpc_password.as_str(),
                            )
                            .with_request_timeout(configuration.request_timeout()),
                    )
                    .context("Failed to create the rpc transport")?,
                };

                let remaining = deadline
                    .saturating_duration_since(Instant::now())
                    .max(Duration::from_millis(1));
                let result = transport.call_within(
                    "getinfo",
                    vec![],
                    configuration.request_timeout().min(remaining),
                );
                bound = Some((endpoint, transport));
                match result {
                    Ok(_) => {
                        debug!("getinfo answered");
                        Ok(ControlFlow::Break(()))
                    }
                    Err(error) => {
                        debug!(%error, "RPC interface is not ready yet");
                        Ok(ControlFlow::Continue(()))
                    }
                }
            },
        )
        .map_err(|error| NodeError::from_poll(error, phase))?;

        bound.ok_or(NodeError::InvalidState {
            operation: "bind the rpc transport of",
            state: phase,
        })
    }

    /// Stops the node and releases the session.
    ///
    /// Every teardown step is attempted even if an earlier one failed; the last failure is
    /// returned. Stopping an already stopped controller does nothing.
    #[instrument(level = "info", skip_all, fields(node_id = self.id))]
    pub fn stop(&mut self) -> Result<(), NodeError> {
        if self.state == NodeState::Stopped {
            debug!("Node is already stopped");
            return Ok(());
        }

        let mut last_error = None;
        self.transport = None;
        self.endpoint = None;

        if let Some(mut handle) = self.handle.take() {
            if let Err(error) = handle.terminate() {
                warn!(?error, "Failed to terminate the node runtime");
                last_error = Some(error.context("Failed to terminate the node runtime"));
            }
        }
        if let Some(session) = self.session.take() {
            if let Err(error) = session.release() {
                warn!(?error, "Failed to release the session directory");
                last_error = Some(error);
            }
        }

        self.transition(NodeState::Stopped);
        match last_error {
            Some(error) => Err(NodeError::Teardown(error)),
            None => Ok(()),
        }
    }

    fn transition(&mut self, state: NodeState) {
        debug!(from = %self.state, to = %state, "Node state transition");
        self.state = state;
    }
}

impl Drop for NodeController {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            error!(node_id = self.id, %error, "Failed to stop the node on drop");
        }
    }
}

/// The directory holding one session's node data, logs and generated files.
///
/// Either the configured state directory, whose node data is cleared on start and removed on
/// release (logs are kept for inspection), or a temporary directory that is removed entirely.
#[derive(Debug)]
struct SessionDirectory {
    root: PathBuf,
    temp_dir: Option<TempDir>,
}

impl SessionDirectory {
    const DATA_DIRECTORY: &'static str = "data";
    const LOGS_DIRECTORY: &'static str = "logs";
    const GENERATED_DIRECTORY: &'static str = "docker";

    fn prepare(state_directory: Option<&Path>) -> anyhow::Result<Self> {
        match state_directory {
            Some(root) => {
                create_dir_all(root).context("Failed to create the state directory")?;
                clear_directory(root.join(Self::DATA_DIRECTORY))
                    .context("Failed to clear the previous node state")?;
                clear_directory(root.join(Self::LOGS_DIRECTORY))
                    .context("Failed to clear the previous node logs")?;
                Ok(Self {
                    root: root.to_path_buf(),
                    temp_dir: None,
                })
            }
            None => {
                let temp_dir = TempDir::with_prefix("dogetest-")
                    .context("Failed to create a temporary session directory")?;
                Ok(Self {
                    root: temp_dir.path().to_path_buf(),
                    temp_dir: Some(temp_dir),
                })
            }
        }
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn data_directory(&self) -> PathBuf {
        self.root.join(Self::DATA_DIRECTORY)
    }

    fn logs_directory(&self) -> PathBuf {
        self.root.join(Self::LOGS_DIRECTORY)
    }

    fn release(self) -> anyhow::Result<()> {
        match self.temp_dir {
            Some(temp_dir) => temp_dir
                .cleanup()
                .context("Failed to remove the temporary session directory"),
            None => {
                let data = remove_directory(self.data_directory());
                let generated = remove_directory(self.root.join(Self::GENERATED_DIRECTORY));
                data.and(generated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::TcpListener,
        sync::{Arc, atomic::AtomicUsize, mpsc},
        thread,
        time::{Duration, Instant},
    };

    use mockito::{Server, ServerGuard};
    use serde_json::{Value, json};

    use super::*;

    /// A fake node RPC interface that answers `getinfo` with the warm-up error until `ready_after`
    /// has elapsed, like a node that accepts connections before its RPC service is attached.
    fn warming_node(ready_after: Duration) -> ServerGuard {
        let mut server = Server::new();
        let created = Instant::now();
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body_from_request(move |request| {
                let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
                let id = body["id"].as_u64().unwrap();
                let response = if created.elapsed() >= ready_after {
                    json!({"id": id, "error": null, "result": {"version": 1140900, "blocks": 0}})
                } else {
                    json!({
                        "id": id,
                        "result": null,
                        "error": {"code": -28, "message": "Loading block index..."}
                    })
                };
                serde_json::to_vec(&response).unwrap()
            })
            .create();
        server
    }

    fn endpoint_of(server: &ServerGuard) -> Endpoint {
        let address = server.socket_address();
        Endpoint::new(address.ip().to_string(), address.port())
    }

    fn unused_endpoint() -> Endpoint {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        Endpoint::new("127.0.0.1", port)
    }

    #[derive(Clone, Default)]
    struct Observations {
        launches: Arc<AtomicUsize>,
        terminations: Arc<AtomicUsize>,
        cancel_on_launch: Option<Cancellation>,
    }

    struct FakeRuntime {
        endpoint: Endpoint,
        readiness: NetworkReadiness,
        unmapped_resolutions: usize,
        log_checks_before_marker: usize,
        running: bool,
        fail_terminate: bool,
        observations: Observations,
    }

    impl FakeRuntime {
        fn new(endpoint: Endpoint) -> Self {
            Self {
                endpoint,
                readiness: NetworkReadiness::TcpConnect,
                unmapped_resolutions: 0,
                log_checks_before_marker: 0,
                running: true,
                fail_terminate: false,
                observations: Observations::default(),
            }
        }
    }

    impl NodeRuntime for FakeRuntime {
        fn network_readiness(&self) -> NetworkReadiness {
            self.readiness.clone()
        }

        fn launch(&mut self, request: &LaunchRequest) -> anyhow::Result<Box<dyn RuntimeHandle>> {
            create_dir_all(&request.data_directory)?;
            self.observations.launches.fetch_add(1, Ordering::SeqCst);
            if let Some(cancellation) = self.observations.cancel_on_launch.as_ref() {
                cancellation.cancel();
            }
            Ok(Box::new(FakeHandle {
                endpoint: self.endpoint.clone(),
                unmapped_resolutions: self.unmapped_resolutions,
                log_checks_before_marker: self.log_checks_before_marker,
                running: self.running,
                fail_terminate: self.fail_terminate,
                terminations: self.observations.terminations.clone(),
            }))
        }
    }

    struct FakeHandle {
        endpoint: Endpoint,
        unmapped_resolutions: usize,
        log_checks_before_marker: usize,
        running: bool,
        fail_terminate: bool,
        terminations: Arc<AtomicUsize>,
    }

    impl RuntimeHandle for FakeHandle {
        fn is_running(&mut self) -> bool {
            self.running
        }

        fn resolved_endpoint(&mut self) -> anyhow::Result<Endpoint> {
            if self.unmapped_resolutions > 0 {
                self.unmapped_resolutions -= 1;
                anyhow::bail!("port is not mapped yet");
            }
            Ok(self.endpoint.clone())
        }

        fn logs_contain(&mut self, _: &str) -> anyhow::Result<bool> {
            if self.log_checks_before_marker > 0 {
                self.log_checks_before_marker -= 1;
                return Ok(false);
            }
            Ok(true)
        }

        fn terminate(&mut self) -> anyhow::Result<()> {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            self.running = false;
            if self.fail_terminate {
                anyhow::bail!("the runtime refused to die");
            }
            Ok(())
        }
    }

    fn configuration(state_directory: &Path) -> NodeConfiguration {
        NodeConfiguration {
            port: Some(22555),
            state_directory: Some(state_directory.to_path_buf()),
            network_timeout_ms: 2_000,
            rpc_timeout_ms: 5_000,
            poll_interval_ms: 20,
            connect_timeout_ms: 200,
            request_timeout_ms: 1_000,
            ..NodeConfiguration::default()
        }
    }

    #[test]
    fn start_succeeds_once_the_rpc_interface_answers() {
        // Arrange
        let server = warming_node(Duration::from_millis(200));
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);

        // Act
        let result = controller.start();

        // Assert
        result.expect("Start should succeed");
        assert_eq!(controller.state(), NodeState::Running);
        assert_eq!(controller.endpoint(), Some(&endpoint_of(&server)));
        let info = controller.rpc().unwrap().get_info().unwrap();
        assert_eq!(info.version, 1140900);
    }

    #[test]
    fn start_times_out_when_the_rpc_interface_never_answers() {
        // Arrange
        let server = warming_node(Duration::from_secs(3600));
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let observations = runtime.observations.clone();
        let configuration = NodeConfiguration {
            rpc_timeout_ms: 300,
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, runtime);

        // Act
        let result = controller.start();

        // Assert
        match result {
            Err(NodeError::StartupTimeout { phase, waited }) => {
                assert_eq!(phase, NodeState::WaitingForRpcReady);
                assert!(waited >= Duration::from_millis(300));
            }
            other => panic!("expected a startup timeout, got {other:?}"),
        }
        assert_eq!(controller.state(), NodeState::Stopped);
        assert!(controller.rpc().is_none());
        assert_eq!(observations.terminations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_times_out_when_the_endpoint_never_accepts_connections() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(unused_endpoint());
        let configuration = NodeConfiguration {
            network_timeout_ms: 200,
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, runtime);

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(
            result,
            Err(NodeError::StartupTimeout {
                phase: NodeState::WaitingForNetwork,
                ..
            })
        ));
        assert_eq!(controller.state(), NodeState::Stopped);
    }

    #[test]
    fn start_retries_until_the_port_mapping_resolves() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let mut runtime = FakeRuntime::new(endpoint_of(&server));
        runtime.readiness = NetworkReadiness::LogMarker("init message: Done loading".to_string());
        runtime.log_checks_before_marker = 3;
        runtime.unmapped_resolutions = 3;
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);

        // Act
        let result = controller.start();

        // Assert
        result.expect("Start should succeed once the mapping resolves");
        assert_eq!(controller.endpoint(), Some(&endpoint_of(&server)));
    }

    #[test]
    fn start_fails_fast_when_the_node_exits() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let mut runtime = FakeRuntime::new(unused_endpoint());
        runtime.running = false;
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(
            result,
            Err(NodeError::Exited {
                phase: NodeState::WaitingForNetwork
            })
        ));
    }

    #[test]
    fn start_can_be_cancelled() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let mut runtime = FakeRuntime::new(unused_endpoint());
        let configuration = NodeConfiguration {
            network_timeout_ms: 60_000,
            ..configuration(temp_dir.path())
        };
        let cancellation = Cancellation::new();
        runtime.observations.cancel_on_launch = Some(cancellation.clone());
        let mut controller = NodeController::with_runtime(configuration, runtime);
        controller.cancellation = cancellation;

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(result, Err(NodeError::Cancelled { .. })));
        assert_eq!(controller.state(), NodeState::Stopped);
    }

    #[test]
    fn cancellation_from_another_thread_aborts_a_hung_start() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(unused_endpoint());
        let configuration = NodeConfiguration {
            network_timeout_ms: 60_000,
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, runtime);
        let cancellation = controller.cancellation();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cancellation.cancel();
        });

        // Act
        let result = controller.start();

        // Assert
        canceller.join().unwrap();
        assert!(matches!(result, Err(NodeError::Cancelled { .. })));
    }

    #[test]
    fn start_is_only_valid_once() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let observations = runtime.observations.clone();
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);
        controller.start().unwrap();

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(
            result,
            Err(NodeError::InvalidState {
                state: NodeState::Running,
                ..
            })
        ));
        assert_eq!(observations.launches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_before_start_and_stop_twice_are_safe() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(unused_endpoint());
        let observations = runtime.observations.clone();
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);

        // Act
        let first = controller.stop();
        let second = controller.stop();

        // Assert
        first.expect("Stopping a created controller is fine");
        second.expect("Stopping twice is fine");
        assert_eq!(controller.state(), NodeState::Stopped);
        assert_eq!(observations.terminations.load(Ordering::SeqCst), 0);
        assert!(matches!(
            controller.start(),
            Err(NodeError::InvalidState { .. })
        ));
    }

    #[test]
    fn stop_terminates_the_runtime_and_removes_node_data() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let observations = runtime.observations.clone();
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);
        controller.start().unwrap();
        assert!(temp_dir.path().join("data").is_dir());

        // Act
        let result = controller.stop();

        // Assert
        result.expect("Stop should succeed");
        assert_eq!(observations.terminations.load(Ordering::SeqCst), 1);
        assert!(!temp_dir.path().join("data").exists());
        assert!(controller.rpc().is_none());
        assert_eq!(controller.state(), NodeState::Stopped);
    }

    #[test]
    fn stop_still_cleans_up_when_termination_fails() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let mut runtime = FakeRuntime::new(endpoint_of(&server));
        runtime.fail_terminate = true;
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);
        controller.start().unwrap();

        // Act
        let result = controller.stop();

        // Assert
        assert!(matches!(result, Err(NodeError::Teardown(_))));
        assert!(!temp_dir.path().join("data").exists());
        assert_eq!(controller.state(), NodeState::Stopped);
        controller.stop().expect("A second stop has nothing left to do");
    }

    #[test]
    fn start_clears_previous_node_state() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let stale = temp_dir.path().join("data").join("regtest");
        create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("wallet.dat"), b"stale").unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);

        // Act
        controller.start().unwrap();

        // Assert
        assert!(!stale.exists());
    }

    #[test]
    fn temporary_session_directory_is_removed_on_stop() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let configuration = NodeConfiguration {
            state_directory: None,
            ..configuration(Path::new("unused"))
        };
        let mut controller = NodeController::with_runtime(configuration, runtime);
        controller.start().unwrap();
        let session_directory = controller.session_directory().unwrap().to_path_buf();
        assert!(session_directory.is_dir());

        // Act
        controller.stop().unwrap();

        // Assert
        assert!(!session_directory.exists());
    }

    #[test]
    fn port_is_probed_when_none_is_configured() {
        // Arrange
        let occupied = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = occupied.local_addr().unwrap().port();
        let temp_dir = TempDir::new().unwrap();
        let configuration = NodeConfiguration {
            port: None,
            port_range_start: port,
            port_range_end: port,
            ..configuration(temp_dir.path())
        };
        let runtime = FakeRuntime::new(unused_endpoint());
        let observations = runtime.observations.clone();
        let mut controller = NodeController::with_runtime(configuration, runtime);

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(result, Err(NodeError::NoPortAvailable { .. })));
        assert_eq!(observations.launches.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state(), NodeState::Stopped);
    }

    #[test]
    fn drop_stops_a_running_node() {
        // Arrange
        let server = warming_node(Duration::ZERO);
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(endpoint_of(&server));
        let observations = runtime.observations.clone();
        let mut controller = NodeController::with_runtime(configuration(temp_dir.path()), runtime);
        controller.start().unwrap();

        // Act
        drop(controller);

        // Assert
        assert_eq!(observations.terminations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_waits_for_an_endpoint_that_comes_up_late() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let endpoint = unused_endpoint();
        let port = endpoint.port;
        let (release, released) = mpsc::channel::<()>();
        let late_listener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            let _listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
            let _ = released.recv();
        });
        let configuration = NodeConfiguration {
            rpc_timeout_ms: 300,
            request_timeout_ms: 100,
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, FakeRuntime::new(endpoint));

        // Act
        let result = controller.start();
        release.send(()).unwrap();
        late_listener.join().unwrap();

        // Assert
        // Nothing speaks RPC on the listener, so the network phase passing is the best outcome.
        assert!(
            matches!(
                result,
                Err(NodeError::StartupTimeout {
                    phase: NodeState::WaitingForRpcReady,
                    ..
                })
            ),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn a_hung_rpc_request_does_not_overrun_the_readiness_deadline() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let silent = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let endpoint = Endpoint::new("127.0.0.1", silent.local_addr().unwrap().port());
        let configuration = NodeConfiguration {
            rpc_timeout_ms: 300,
            request_timeout_ms: 30_000,
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, FakeRuntime::new(endpoint));
        let started = Instant::now();

        // Act
        let result = controller.start();

        // Assert
        match result {
            Err(NodeError::StartupTimeout { phase, waited }) => {
                assert_eq!(phase, NodeState::WaitingForRpcReady);
                assert!(waited < Duration::from_secs(2), "waited {waited:?}");
            }
            other => panic!("expected a startup timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(silent);
    }

    #[test]
    fn start_rejects_empty_rpc_credentials() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new(unused_endpoint());
        let observations = runtime.observations.clone();
        let configuration = NodeConfiguration {
            rpc_user: String::new(),
            ..configuration(temp_dir.path())
        };
        let mut controller = NodeController::with_runtime(configuration, runtime);

        // Act
        let result = controller.start();

        // Assert
        assert!(matches!(result, Err(NodeError::InvalidConfiguration { .. })));
        assert_eq!(observations.launches.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state(), NodeState::Stopped);
    }
}
