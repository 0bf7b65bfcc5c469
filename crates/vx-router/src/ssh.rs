//! Router access over SSH
//!
//! Every call opens its own session: connect, authenticate with the
//! configured password, run one exec channel, disconnect. Config files are
//! copied with the SCP sink protocol (`scp -t <dest>`) so the router only
//! needs a stock `scp` binary, not an SFTP subsystem.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use vx_core::config::RouterConfig;
use vx_core::error::TransportError;

use crate::exec::CommandRunner;

/// How long to wait for the SSH handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs commands on the router over SSH
pub struct SshRunner {
    address: String,
    user: String,
    password: String,
    connect_timeout: Duration,
}

impl SshRunner {
    pub fn new(router: &RouterConfig) -> Self {
        Self {
            address: router.address(),
            user: router.user.clone(),
            password: router.password.clone().unwrap_or_default(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect and authenticate a fresh session
    async fn connect(&self) -> Result<Handle<ClientHandler>, TransportError> {
        let config = Arc::new(Config::default());

        tracing::debug!("Connecting to {}", self.address);
        let mut session = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, self.address.as_str(), ClientHandler),
        )
        .await
        .map_err(|_| TransportError::Connect {
            address: self.address.clone(),
            message: "Connection timed out".to_string(),
        })?
        .map_err(|e| TransportError::Connect {
            address: self.address.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!("Authenticating as user '{}'", self.user);
        let authenticated = session
            .authenticate_password(&self.user, &self.password)
            .await
            .map_err(|e| TransportError::Ssh(format!("Authentication error: {}", e)))?;

        if !authenticated {
            return Err(TransportError::AuthRejected {
                user: self.user.clone(),
            });
        }
        Ok(session)
    }

    async fn open_exec(
        &self,
        session: &Handle<ClientHandler>,
        command: &str,
    ) -> Result<Channel<Msg>, TransportError> {
        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Ssh(format!("Failed to open session channel: {}", e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Ssh(format!("Failed to execute `{}`: {}", command, e)))?;
        Ok(channel)
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> Result<String, TransportError> {
        if command.trim().is_empty() {
            return Err(TransportError::EmptyCommand);
        }

        let session = self.connect().await?;
        tracing::debug!("Executing on {}: {}", self.address, command);
        let mut channel = self.open_exec(&session, command).await?;
        let output = collect_output(&mut channel).await;
        disconnect(&session).await;

        tracing::debug!("Output of `{}`: {}", command, output.stdout.trim_end());
        match output.exit_status {
            Some(0) | None => Ok(output.stdout),
            Some(status) => Err(TransportError::CommandFailed {
                command: command.to_string(),
                status: Some(status as i32),
                stderr: output.stderr.trim_end().to_string(),
            }),
        }
    }

    async fn install(
        &self,
        source: &Path,
        destination: &str,
        mode: u32,
    ) -> Result<(), TransportError> {
        let content = tokio::fs::read(source).await?;
        let name = Path::new(destination)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());

        let session = self.connect().await?;
        let result = scp_send(self, &session, &content, &name, destination, mode).await;
        disconnect(&session).await;
        result?;

        tracing::debug!("Copied {} bytes to {}:{}", content.len(), self.address, destination);
        Ok(())
    }
}

/// Everything an exec channel produced before it closed
#[derive(Debug, Default)]
struct ExecOutput {
    stdout: String,
    stderr: String,
    exit_status: Option<u32>,
}

async fn collect_output(channel: &mut Channel<Msg>) -> ExecOutput {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    // ExitStatus may arrive after Eof, so only Close ends the loop
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    ExecOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    }
}

/// SCP sink upload of a single file
async fn scp_send(
    runner: &SshRunner,
    session: &Handle<ClientHandler>,
    content: &[u8],
    name: &str,
    destination: &str,
    mode: u32,
) -> Result<(), TransportError> {
    let copy_err = |message: String| TransportError::Copy {
        destination: destination.to_string(),
        message,
    };

    let mut channel = runner
        .open_exec(session, &format!("scp -t {}", destination))
        .await?;
    read_ack(&mut channel).await.map_err(copy_err)?;

    let header = format!("C{:04o} {} {}\n", mode & 0o7777, content.len(), name);
    send(&channel, header.as_bytes()).await?;
    read_ack(&mut channel).await.map_err(copy_err)?;

    send(&channel, content).await?;
    send(&channel, &[0u8]).await?;
    read_ack(&mut channel).await.map_err(copy_err)?;

    channel
        .eof()
        .await
        .map_err(|e| TransportError::Ssh(e.to_string()))?;
    let output = collect_output(&mut channel).await;
    match output.exit_status {
        Some(0) | None => Ok(()),
        Some(status) => Err(copy_err(format!(
            "scp exited with status {}: {}",
            status,
            output.stderr.trim_end()
        ))),
    }
}

async fn send(channel: &Channel<Msg>, bytes: &[u8]) -> Result<(), TransportError> {
    channel
        .data(bytes)
        .await
        .map_err(|e| TransportError::Ssh(format!("Failed to send data: {}", e)))
}

/// Wait for the remote scp acknowledgement byte
///
/// `0` is success; `1` (warning) and `2` (fatal) are followed by a message.
async fn read_ack(channel: &mut Channel<Msg>) -> Result<(), String> {
    let mut stderr = Vec::new();
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                return match data.first() {
                    Some(0) => Ok(()),
                    Some(_) => Err(String::from_utf8_lossy(&data[1..]).trim().to_string()),
                    None => continue,
                };
            }
            ChannelMsg::ExtendedData { data, .. } => stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } if exit_status != 0 => {
                return Err(format!(
                    "scp exited with status {}: {}",
                    exit_status,
                    String::from_utf8_lossy(&stderr).trim()
                ));
            }
            ChannelMsg::Eof | ChannelMsg::Close => break,
            _ => {}
        }
    }
    Err("Channel closed before acknowledgement".to_string())
}

async fn disconnect(session: &Handle<ClientHandler>) {
    if let Err(e) = session
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        tracing::debug!("Disconnect failed: {}", e);
    }
}

/// SSH client callbacks
///
/// Router host keys are not pinned; the fingerprint is logged for operators.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Router host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_from_router_config() {
        let router = RouterConfig {
            host: "10.1.1.1".to_string(),
            port: 2222,
            user: "root".to_string(),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let runner = SshRunner::new(&router);
        assert_eq!(runner.address(), "10.1.1.1:2222");
        assert_eq!(runner.user, "root");
        assert_eq!(runner.password, "secret");
        assert_eq!(runner.staging_dir("/etc/ipsec.conf"), std::env::temp_dir());
    }

    #[tokio::test]
    async fn test_empty_command_needs_no_connection() {
        let runner = SshRunner::new(&RouterConfig::default());
        assert!(matches!(
            runner.run("").await,
            Err(TransportError::EmptyCommand)
        ));
    }

    #[test]
    fn test_scp_header_format() {
        let header = format!("C{:04o} {} {}\n", 0o644 & 0o7777, 12, "ipsec.conf");
        assert_eq!(header, "C0644 12 ipsec.conf\n");
    }
}
