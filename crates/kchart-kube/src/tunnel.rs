//! Scoped port-forwards to cluster-internal databases
//!
//! A [`Tunnel`] owns a background `kubectl port-forward`. Dropping it sends
//! the termination signal, so the forward is torn down on every exit path of
//! the code using it: normal return, error, or panic.

use kchart_core::TunnelConfig;
use std::time::Duration;

use crate::cluster::{Cluster, port_forward_command};
use crate::error::{KubeError, Result};
use crate::runner::{BackgroundProcess, CommandRunner};

/// Where and how to open a tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    pub namespace: String,
    /// Pattern selecting the pod to forward through
    pub pod_pattern: String,
    pub local_port: u16,
    pub remote_port: u16,
    /// Wait after starting the forward; there is no readiness probe
    pub settle_delay: Duration,
}

impl TunnelSpec {
    pub fn from_config(namespace: impl Into<String>, config: &TunnelConfig) -> Self {
        Self {
            namespace: namespace.into(),
            pod_pattern: config.pod_pattern.clone(),
            local_port: config.local_port,
            remote_port: config.remote_port,
            settle_delay: config.settle_delay,
        }
    }
}

/// A running port-forward
pub struct Tunnel {
    process: Box<dyn BackgroundProcess>,
    pod: String,
    local_port: u16,
    terminated: bool,
}

impl Tunnel {
    /// Find the forwarding pod, start the forward and wait for it to settle
    pub fn open<R: CommandRunner + ?Sized>(runner: &R, spec: &TunnelSpec) -> Result<Self> {
        let pod = Cluster::new(runner)
            .find_pod(&spec.namespace, &spec.pod_pattern)?
            .ok_or_else(|| KubeError::ObjectNotFound {
                kind: "pod".to_string(),
                pattern: spec.pod_pattern.clone(),
                namespace: spec.namespace.clone(),
            })?;

        let command =
            port_forward_command(&spec.namespace, &pod, spec.local_port, spec.remote_port);
        let process = runner.spawn(&command).map_err(|e| match e {
            KubeError::MissingExecutable { .. } => e,
            other => KubeError::Tunnel(format!("cannot start port-forward to '{}': {}", pod, other)),
        })?;

        // From here on, Drop tears the forward down whatever happens
        let mut tunnel = Self {
            process,
            pod,
            local_port: spec.local_port,
            terminated: false,
        };

        if !spec.settle_delay.is_zero() {
            std::thread::sleep(spec.settle_delay);
        }

        if !tunnel.process.is_running()? {
            let stderr = tunnel.process.stderr();
            return Err(KubeError::Tunnel(format!(
                "port-forward to '{}' exited early: {}",
                tunnel.pod, stderr
            )));
        }

        tracing::info!(
            pod = %tunnel.pod,
            local_port = tunnel.local_port,
            pid = tunnel.process.id(),
            "tunnel open"
        );
        Ok(tunnel)
    }

    /// Pod the forward goes through
    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Tear the forward down now, reporting any failure
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        tracing::debug!(pod = %self.pod, pid = self.process.id(), "closing tunnel");
        self.process.terminate()
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(pod = %self.pod, "failed to stop port-forward: {}", e);
        }
    }
}

/// Run `body` while a tunnel is open
///
/// The forward is terminated exactly once after `body` finishes, and the
/// body's result is returned untouched.
pub fn with_tunnel<R, T, E, F>(runner: &R, spec: &TunnelSpec, body: F) -> std::result::Result<T, E>
where
    R: CommandRunner + ?Sized,
    E: From<KubeError>,
    F: FnOnce(&Tunnel) -> std::result::Result<T, E>,
{
    let tunnel = Tunnel::open(runner, spec)?;
    let result = body(&tunnel);
    drop(tunnel);
    result
}
