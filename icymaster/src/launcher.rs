//! Lancement des processus player, local ou distant.
//!
//! Le master ne connaît du lancement que le contrat start/wait/kill : le
//! trait permet d'injecter un lanceur factice dans les tests et de changer
//! de mécanisme d'exécution distante sans toucher au registre.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::model::{LaunchSpec, PlayerExit};
use crate::MasterError;

/// Variable d'environnement donnant le chemin du binaire player.
pub const PLAYER_BIN_ENV: &str = "ICYRADIO_PLAYER_BIN";

/// Processus player en cours d'exécution.
#[async_trait]
pub trait PlayerProcess: Send {
    /// Attend la fin du processus.
    async fn wait(&mut self) -> PlayerExit;
    /// Terminaison forcée (nettoyage).
    async fn kill(&mut self);
}

/// Capacité de lancement d'un player à partir d'une spécification validée.
#[async_trait]
pub trait PlayerLauncher: Send + Sync {
    async fn start(&self, spec: &LaunchSpec) -> Result<Box<dyn PlayerProcess>, MasterError>;
}

/// Lanceur réel : spawn local si `player_host` est la boucle locale,
/// `ssh <host> player …` sinon.
pub struct ProcessLauncher {
    player_bin: String,
}

impl ProcessLauncher {
    pub fn from_env() -> Self {
        Self {
            player_bin: std::env::var(PLAYER_BIN_ENV).unwrap_or_else(|_| "player".to_string()),
        }
    }
}

#[async_trait]
impl PlayerLauncher for ProcessLauncher {
    async fn start(&self, spec: &LaunchSpec) -> Result<Box<dyn PlayerProcess>, MasterError> {
        let local = is_loopback(&spec.player_host).await;
        let mut command = if local {
            Command::new(&self.player_bin)
        } else {
            let mut ssh = Command::new("ssh");
            ssh.arg(&spec.player_host).arg(&self.player_bin);
            ssh
        };
        command
            .args(spec.player_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            warn!(host = %spec.player_host, "player spawn failed: {e}");
            MasterError::Launch(e.to_string())
        })?;
        info!(
            host = %spec.player_host,
            source = %spec.source_host,
            local,
            "player launched"
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

async fn is_loopback(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    match tokio::net::lookup_host((host, 0u16)).await {
        Ok(mut addrs) => addrs.any(|addr| addr.ip().is_loopback()),
        Err(_) => false,
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl PlayerProcess for ChildProcess {
    async fn wait(&mut self) -> PlayerExit {
        match self.child.wait().await {
            Ok(status) if status.success() => PlayerExit::Clean,
            Ok(_) | Err(_) => PlayerExit::Crashed,
        }
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}
