//! Canal de contrôle UDP du player.
//!
//! Quatre commandes textuelles, comparées sur le datagramme entier et
//! sensibles à la casse. Tout autre payload est jeté en silence : le canal
//! doit survivre à un déluge de datagrammes invalides sans bloquer la
//! boucle de streaming.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Commande reconnue sur le canal de contrôle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Pause,
    Quit,
    Title,
}

pub struct ControlChannel {
    socket: UdpSocket,
}

impl ControlChannel {
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        Ok(Self { socket })
    }

    /// Attend la prochaine commande reconnue.
    ///
    /// Les datagrammes non reconnus sont consommés dans la boucle interne ;
    /// annulable sans perte (utilisé dans un `select!`).
    pub async fn recv(&self) -> (ControlCommand, SocketAddr) {
        let mut buf = [0u8; 512];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("control socket receive error: {e}");
                    continue;
                }
            };
            let command = match &buf[..len] {
                b"PLAY" => ControlCommand::Play,
                b"PAUSE" => ControlCommand::Pause,
                b"QUIT" => ControlCommand::Quit,
                b"TITLE" => ControlCommand::Title,
                other => {
                    debug!(len = other.len(), %peer, "ignoring unknown control datagram");
                    continue;
                }
            };
            return (command, peer);
        }
    }

    /// Répond à `TITLE` avec le titre courant (payload brut, vide autorisé).
    pub async fn send_title(&self, peer: SocketAddr, title: &str) {
        if let Err(e) = self.socket.send_to(title.as_bytes(), peer).await {
            warn!(%peer, "cannot send TITLE reply: {e}");
        }
    }
}
