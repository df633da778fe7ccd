use std::{fs::create_dir_all, path::PathBuf, process::Stdio};

use anyhow::Context;
use tracing::instrument;

use crate::{Endpoint, LaunchRequest, NetworkReadiness, NodeRuntime, RuntimeHandle, process::Process};

/// Runs `dogecoind -regtest` as a child process.
///
/// The node is configured entirely through command line arguments, its data directory lives in
/// the session directory and its output is captured into the session's log directory.
#[derive(Clone, Debug)]
pub struct LocalProcessRuntime {
    binary: PathBuf,
    log_output: bool,
}

impl LocalProcessRuntime {
    const LOG_FILE_PREFIX: &'static str = "dogecoind";

    pub fn new(binary: PathBuf, log_output: bool) -> Self {
        Self { binary, log_output }
    }

    fn rpc_allow_ip(host: &str) -> &'static str {
        match host {
            "127.0.0.1" | "localhost" | "::1" => "127.0.0.1",
            _ => "0.0.0.0/0",
        }
    }
}

impl NodeRuntime for LocalProcessRuntime {
    fn network_readiness(&self) -> NetworkReadiness {
        NetworkReadiness::TcpConnect
    }

    #[instrument(level = "info", skip_all, fields(port = request.port), err)]
    fn launch(&mut self, request: &LaunchRequest) -> anyhow::Result<Box<dyn RuntimeHandle>> {
        create_dir_all(&request.data_directory)
            .context("Failed to create the dogecoind data directory")?;
        create_dir_all(&request.logs_directory)
            .context("Failed to create the dogecoind logs directory")?;

        let process = Process::new(
            Self::LOG_FILE_PREFIX,
            &request.logs_directory,
            &self.binary,
            |command, stdout_file, stderr_file| {
                command
                    .arg("-regtest")
                    .arg("-server")
                    .arg("-listen=0")
                    .arg("-printtoconsole")
                    .arg(format!("-datadir={}", request.data_directory.display()))
                    .arg(format!("-rpcport={}", request.port))
                    .arg(format!("-rpcbind={}", request.host))
                    .arg(format!("-rpcallowip={}", Self::rpc_allow_ip(&request.host)))
                    .arg(format!("-rpcuser={}", request.rpc_user))
                    .arg(format!("-rpcpassword={}", request.rpc_password))
                    .stdin(Stdio::null())
                    .stdout(stdout_file)
                    .stderr(stderr_file);
            },
        )
        .context("Failed to spawn dogecoind")?;

        Ok(Box::new(LocalProcessHandle {
            process,
            endpoint: Endpoint::new(request.host.clone(), request.port),
            log_output: self.log_output,
        }))
    }
}

#[derive(Debug)]
pub struct LocalProcessHandle {
    process: Process,
    endpoint: Endpoint,
    log_output: bool,
}

impl RuntimeHandle for LocalProcessHandle {
    fn is_running(&mut self) -> bool {
        self.process.is_running()
    }

    fn resolved_endpoint(&mut self) -> anyhow::Result<Endpoint> {
        Ok(self.endpoint.clone())
    }

    fn logs_contain(&mut self, marker: &str) -> anyhow::Result<bool> {
        self.process.logs_contain(marker)
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        let result = self.process.kill();
        if self.log_output {
            self.process.log_captured_output(LocalProcessRuntime::LOG_FILE_PREFIX);
        }
        result
    }
}
