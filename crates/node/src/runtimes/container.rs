use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, bail};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{Endpoint, LaunchRequest, NetworkReadiness, NodeRuntime, RuntimeHandle, process::Process};

const DOCKERFILE: &str = include_str!("../../assets/Dockerfile.dogecoin");

/// Builds and runs the node in a container through the docker CLI.
///
/// The RPC port is published to a random host port, which is resolved after the container
/// started. A bridge network is created for the container unless the request names one.
#[derive(Clone, Debug)]
pub struct ContainerRuntime {
    docker: PathBuf,
    log_output: bool,
}

impl ContainerRuntime {
    const READY_MARKER: &'static str = "init message: Done loading";

    const BUILD_DIRECTORY: &'static str = "docker";
    const DOCKERFILE_NAME: &'static str = "Dockerfile.dogecoin";
    const LOG_FILE_PREFIX: &'static str = "container";

    pub fn new(docker: PathBuf, log_output: bool) -> Self {
        Self { docker, log_output }
    }
}

impl NodeRuntime for ContainerRuntime {
    fn network_readiness(&self) -> NetworkReadiness {
        NetworkReadiness::LogMarker(Self::READY_MARKER.to_string())
    }

    #[instrument(level = "info", skip_all, fields(port = request.port), err)]
    fn launch(&mut self, request: &LaunchRequest) -> anyhow::Result<Box<dyn RuntimeHandle>> {
        let session_id = Uuid::new_v4().simple().to_string();
        let session_id = &session_id[..12];

        let mut handle = ContainerHandle {
            docker: self.docker.clone(),
            host: request.host.clone(),
            container_port: request.port,
            image: None,
            created_network: None,
            container_id: None,
            logs: None,
            log_output: self.log_output,
        };

        // Whatever got created before a failure has to go again.
        if let Err(error) = handle.start(request, session_id) {
            if let Err(cleanup_error) = handle.terminate() {
                warn!(?cleanup_error, "Failed to clean up after a failed container launch");
            }
            return Err(error);
        }
        Ok(Box::new(handle))
    }
}

#[derive(Debug)]
pub struct ContainerHandle {
    docker: PathBuf,
    host: String,
    container_port: u16,
    image: Option<String>,
    created_network: Option<String>,
    container_id: Option<String>,
    logs: Option<Process>,
    log_output: bool,
}

impl ContainerHandle {
    fn start(&mut self, request: &LaunchRequest, session_id: &str) -> anyhow::Result<()> {
        let build_directory = request
            .session_directory
            .join(ContainerRuntime::BUILD_DIRECTORY);
        create_dir_all(&build_directory).context("Failed to create the docker build directory")?;
        let dockerfile = build_directory.join(ContainerRuntime::DOCKERFILE_NAME);
        write(&dockerfile, DOCKERFILE).context("Failed to write the Dockerfile")?;

        let image = format!("dogetest-dogecoin:{session_id}");
        run_docker(
            &self.docker,
            [
                "build".to_string(),
                "--tag".to_string(),
                image.clone(),
                "--build-arg".to_string(),
                format!("PORT={}", request.port),
                "--file".to_string(),
                dockerfile.display().to_string(),
                build_directory.display().to_string(),
            ],
        )
        .context("Failed to build the node image")?;
        self.image = Some(image.clone());

        let network = match request.network.as_ref() {
            Some(network) => network.clone(),
            None => {
                let network = format!("dogetest-{session_id}");
                run_docker(
                    &self.docker,
                    ["network", "create", "--driver", "bridge", network.as_str()],
                )
                .context("Failed to create the container network")?;
                self.created_network = Some(network.clone());
                network
            }
        };

        let container_id = run_docker(
            &self.docker,
            [
                "run".to_string(),
                "--detach".to_string(),
                "--name".to_string(),
                format!("dogecoin-{}-{session_id}", request.port),
                "--network".to_string(),
                network,
                "--publish".to_string(),
                format!("{}/tcp", request.port),
                "--env".to_string(),
                format!("PORT={}", request.port),
                "--env".to_string(),
                format!("RPC_USER={}", request.rpc_user),
                "--env".to_string(),
                format!("RPC_PASSWORD={}", request.rpc_password),
                image,
            ],
        )
        .context("Failed to run the node container")?;
        debug!(%container_id, "Started container");
        self.container_id = Some(container_id.clone());

        create_dir_all(&request.logs_directory)
            .context("Failed to create the container logs directory")?;
        let logs = Process::new(
            ContainerRuntime::LOG_FILE_PREFIX,
            &request.logs_directory,
            &self.docker,
            |command, stdout_file, stderr_file| {
                command
                    .arg("logs")
                    .arg("--follow")
                    .arg(&container_id)
                    .stdin(Stdio::null())
                    .stdout(stdout_file)
                    .stderr(stderr_file);
            },
        )
        .context("Failed to follow the container logs")?;
        self.logs = Some(logs);

        Ok(())
    }

    fn container_id(&self) -> anyhow::Result<&str> {
        self.container_id
            .as_deref()
            .context("The container was never started")
    }
}

impl RuntimeHandle for ContainerHandle {
    fn is_running(&mut self) -> bool {
        let Ok(container_id) = self.container_id() else {
            return false;
        };
        run_docker(
            &self.docker,
            ["inspect", "--format", "{{.State.Running}}", container_id],
        )
        .map(|running| running == "true")
        .unwrap_or(false)
    }

    fn resolved_endpoint(&mut self) -> anyhow::Result<Endpoint> {
        let container_id = self.container_id()?;
        let mapping = run_docker(
            &self.docker,
            [
                "port".to_string(),
                container_id.to_string(),
                format!("{}/tcp", self.container_port),
            ],
        )
        .context("The container port is not mapped yet")?;
        let port = parse_port_mapping(&mapping)?;
        Ok(Endpoint::new(self.host.clone(), port))
    }

    fn logs_contain(&mut self, marker: &str) -> anyhow::Result<bool> {
        match self.logs.as_ref() {
            Some(logs) => logs.logs_contain(marker),
            None => Ok(false),
        }
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        let mut last_error = None;

        if let Some(mut logs) = self.logs.take() {
            if self.log_output {
                logs.log_captured_output(ContainerRuntime::LOG_FILE_PREFIX);
            }
            if let Err(error) = logs.kill() {
                warn!(?error, "Failed to stop following the container logs");
                last_error = Some(error);
            }
        }
        if let Some(container_id) = self.container_id.take() {
            if let Err(error) = run_docker(&self.docker, ["rm", "--force", container_id.as_str()])
            {
                warn!(?error, "Failed to remove the container");
                last_error = Some(error);
            }
        }
        if let Some(network) = self.created_network.take() {
            if let Err(error) = run_docker(&self.docker, ["network", "rm", network.as_str()]) {
                warn!(?error, "Failed to remove the container network");
                last_error = Some(error);
            }
        }
        if let Some(image) = self.image.take() {
            if let Err(error) = run_docker(&self.docker, ["image", "rm", "--force", image.as_str()])
            {
                warn!(?error, "Failed to remove the node image");
                last_error = Some(error);
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Runs the docker CLI and returns its trimmed stdout.
fn run_docker<I, S>(docker: &Path, args: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect::<Vec<_>>();
    let output = Command::new(docker)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run {} {}", docker.display(), args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "{} {} failed with {}: {}",
            docker.display(),
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Parses the host port out of `docker port` output such as `0.0.0.0:49153` (one line per
/// address family).
fn parse_port_mapping(mapping: &str) -> anyhow::Result<u16> {
    let line = mapping
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .context("docker reported no port mapping")?;
    let (_, port) = line
        .rsplit_once(':')
        .with_context(|| format!("Unexpected port mapping: {line}"))?;
    port.parse()
        .with_context(|| format!("Unexpected port in mapping: {line}"))
}
