//! Registre des players : identités, états, supervision.
//!
//! Toutes les transitions passent par le mutex interne et sont
//! idempotentes : un moniteur de sortie périmé ne peut pas écraser l'état
//! d'un player déjà arrêté, et un lancement qui vient d'être déclenché ne
//! peut pas être marqué `Crashed` par une autre tâche.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::model::{LaunchSpec, PlayerExit, PlayerId, PlayerState};
use crate::{MasterError, PlayerLauncher};

struct PlayerEntry {
    state: PlayerState,
    spec: LaunchSpec,
    /// Canal de notification de crash vers la connexion propriétaire.
    owner: mpsc::UnboundedSender<PlayerId>,
}

struct Inner {
    next_id: PlayerId,
    players: HashMap<PlayerId, PlayerEntry>,
}

pub struct PlayerRegistry {
    launcher: Arc<dyn PlayerLauncher>,
    /// Socket partagée pour les datagrammes de contrôle sortants.
    control: UdpSocket,
    inner: Mutex<Inner>,
}

impl PlayerRegistry {
    pub async fn new(launcher: Arc<dyn PlayerLauncher>) -> std::io::Result<Arc<Self>> {
        let control = UdpSocket::bind(("0.0.0.0", 0)).await?;
        Ok(Arc::new(Self {
            launcher,
            control,
            inner: Mutex::new(Inner {
                next_id: 1,
                players: HashMap::new(),
            }),
        }))
    }

    /// Réserve le prochain id pour une spécification validée.
    ///
    /// L'id n'est jamais réutilisé, y compris après `Stopped`/`Crashed`.
    pub async fn allocate(
        &self,
        spec: LaunchSpec,
        owner: mpsc::UnboundedSender<PlayerId>,
        scheduled: bool,
    ) -> PlayerId {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let state = if scheduled {
            PlayerState::Scheduled
        } else {
            PlayerState::Running
        };
        inner.players.insert(id, PlayerEntry { state, spec, owner });
        info!(id, ?state, "player registered");
        id
    }

    pub async fn state(&self, id: PlayerId) -> Option<PlayerState> {
        self.inner.lock().await.players.get(&id).map(|e| e.state)
    }

    /// Démarre le processus du player `id` et installe son moniteur de
    /// sortie. Un échec de lancement vaut crash (notification comprise).
    pub async fn launch(self: &Arc<Self>, id: PlayerId) {
        let spec = {
            let inner = self.inner.lock().await;
            match inner.players.get(&id) {
                Some(entry) if !entry.state.is_terminal() => entry.spec.clone(),
                _ => return,
            }
        };
        match self.launcher.start(&spec).await {
            Ok(mut process) => {
                {
                    let mut inner = self.inner.lock().await;
                    if let Some(entry) = inner.players.get_mut(&id) {
                        if entry.state == PlayerState::Scheduled {
                            entry.state = PlayerState::Running;
                        }
                    }
                }
                let registry = Arc::clone(self);
                tokio::spawn(async move {
                    let exit = process.wait().await;
                    registry.on_exit(id, exit).await;
                });
            }
            Err(e) => {
                warn!(id, "launch failed: {e}");
                self.on_exit(id, PlayerExit::Crashed).await;
            }
        }
    }

    /// Déclenchement différé par l'ordonnanceur : ne lance que si le player
    /// est toujours `Scheduled` (une annulation rend l'entrée caduque).
    pub async fn fire_scheduled(self: &Arc<Self>, id: PlayerId) {
        let still_scheduled = {
            let inner = self.inner.lock().await;
            matches!(
                inner.players.get(&id).map(|e| e.state),
                Some(PlayerState::Scheduled)
            )
        };
        if still_scheduled {
            info!(id, "scheduled launch firing");
            self.launch(id).await;
        } else {
            debug!(id, "stale schedule entry skipped");
        }
    }

    /// Terminaison demandée par l'opérateur ou l'ordonnanceur.
    pub async fn quit(&self, id: PlayerId) -> Result<(), MasterError> {
        enum Action {
            Cancelled,
            Signal(String, u16),
        }
        let action = {
            let mut inner = self.inner.lock().await;
            let entry = inner
                .players
                .get_mut(&id)
                .ok_or(MasterError::UnknownPlayer(id))?;
            match entry.state {
                PlayerState::Scheduled => {
                    entry.state = PlayerState::Stopped;
                    Action::Cancelled
                }
                PlayerState::Running | PlayerState::Paused => {
                    entry.state = PlayerState::Stopping;
                    Action::Signal(entry.spec.player_host.clone(), entry.spec.control_port)
                }
                _ => return Err(MasterError::NotAddressable(id)),
            }
        };
        match action {
            Action::Cancelled => {
                info!(id, "scheduled launch cancelled");
                Ok(())
            }
            Action::Signal(host, port) => {
                info!(id, "QUIT forwarded to player");
                self.send_control(&host, port, b"QUIT").await
            }
        }
    }

    /// Relaye `PLAY`/`PAUSE` vers le canal de contrôle du player.
    ///
    /// Échoue si le player n'est pas vivant (`Scheduled`, terminal ou
    /// inconnu) : aucun engine n'existe pour recevoir le datagramme.
    pub async fn forward_control(&self, id: PlayerId, pause: bool) -> Result<(), MasterError> {
        let (host, port) = {
            let mut inner = self.inner.lock().await;
            let entry = inner
                .players
                .get_mut(&id)
                .ok_or(MasterError::UnknownPlayer(id))?;
            if !entry.state.is_live() {
                return Err(MasterError::NotAddressable(id));
            }
            entry.state = if pause {
                PlayerState::Paused
            } else {
                PlayerState::Running
            };
            (entry.spec.player_host.clone(), entry.spec.control_port)
        };
        let payload: &[u8] = if pause { b"PAUSE" } else { b"PLAY" };
        self.send_control(&host, port, payload).await
    }

    /// Transition observée par le moniteur de processus.
    async fn on_exit(&self, id: PlayerId, exit: PlayerExit) {
        let notify = {
            let mut inner = self.inner.lock().await;
            let Some(entry) = inner.players.get_mut(&id) else {
                return;
            };
            match entry.state {
                PlayerState::Stopping => {
                    entry.state = PlayerState::Stopped;
                    info!(id, "player stopped");
                    None
                }
                PlayerState::Running | PlayerState::Paused | PlayerState::Scheduled => {
                    if exit == PlayerExit::Clean {
                        entry.state = PlayerState::Stopped;
                        info!(id, "player finished");
                        None
                    } else {
                        entry.state = PlayerState::Crashed;
                        warn!(id, "player crashed");
                        Some(entry.owner.clone())
                    }
                }
                // Transition périmée : l'état terminal est déjà acquis.
                PlayerState::Stopped | PlayerState::Crashed => None,
            }
        };
        if let Some(owner) = notify {
            // Connexion propriétaire déjà fermée : notification perdue.
            let _ = owner.send(id);
        }
    }

    async fn send_control(&self, host: &str, port: u16, payload: &[u8]) -> Result<(), MasterError> {
        self.control
            .send_to(payload, (host, port))
            .await
            .map_err(MasterError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::PlayerProcess;

    /// Lanceur factice dont les processus se terminent sur ordre du test.
    struct StubLauncher {
        exits: Mutex<Vec<tokio::sync::oneshot::Sender<PlayerExit>>>,
    }

    struct StubProcess {
        exit: tokio::sync::oneshot::Receiver<PlayerExit>,
    }

    #[async_trait]
    impl PlayerProcess for StubProcess {
        async fn wait(&mut self) -> PlayerExit {
            (&mut self.exit).await.unwrap_or(PlayerExit::Clean)
        }

        async fn kill(&mut self) {}
    }

    #[async_trait]
    impl PlayerLauncher for StubLauncher {
        async fn start(&self, _spec: &LaunchSpec) -> Result<Box<dyn PlayerProcess>, MasterError> {
            let (tx, rx) = tokio::sync::oneshot::channel();
            self.exits.lock().await.push(tx);
            Ok(Box::new(StubProcess { exit: rx }))
        }
    }

    fn spec() -> LaunchSpec {
        LaunchSpec {
            player_host: "127.0.0.1".to_string(),
            source_host: "radio.example".to_string(),
            path: "/".to_string(),
            source_port: 8904,
            output: "-".to_string(),
            control_port: 40123,
            want_metadata: false,
        }
    }

    fn stub() -> Arc<StubLauncher> {
        Arc::new(StubLauncher {
            exits: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn ids_start_at_one_and_never_repeat() {
        let launcher = stub();
        let registry = PlayerRegistry::new(launcher.clone()).await.unwrap();
        let (owner, _rx) = mpsc::unbounded_channel();

        let a = registry.allocate(spec(), owner.clone(), false).await;
        let b = registry.allocate(spec(), owner.clone(), true).await;
        assert_eq!((a, b), (1, 2));

        registry.launch(a).await;
        let exit = launcher.exits.lock().await.pop().unwrap();
        exit.send(PlayerExit::Crashed).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(registry.state(a).await, Some(PlayerState::Crashed));

        // L'id suivant continue la séquence malgré le crash.
        let c = registry.allocate(spec(), owner, false).await;
        assert_eq!(c, 3);
    }

    #[tokio::test]
    async fn crash_notifies_the_owner_exactly_once() {
        let launcher = stub();
        let registry = PlayerRegistry::new(launcher.clone()).await.unwrap();
        let (owner, mut rx) = mpsc::unbounded_channel();

        let id = registry.allocate(spec(), owner, false).await;
        registry.launch(id).await;
        let exit = launcher.exits.lock().await.pop().unwrap();
        exit.send(PlayerExit::Crashed).unwrap();

        assert_eq!(rx.recv().await, Some(id));
        // Plus aucune notification ensuite.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn commanded_stop_is_not_a_crash() {
        let launcher = stub();
        let registry = PlayerRegistry::new(launcher.clone()).await.unwrap();
        let (owner, mut rx) = mpsc::unbounded_channel();

        let id = registry.allocate(spec(), owner, false).await;
        registry.launch(id).await;
        registry.quit(id).await.unwrap();

        // Le processus meurt après le QUIT, même avec un code non nul.
        let exit = launcher.exits.lock().await.pop().unwrap();
        exit.send(PlayerExit::Crashed).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(registry.state(id).await, Some(PlayerState::Stopped));
        assert!(rx.try_recv().is_err());
        // Terminal : plus adressable.
        assert!(registry.quit(id).await.is_err());
        assert!(registry.forward_control(id, true).await.is_err());
    }

    #[tokio::test]
    async fn scheduled_players_reject_control_and_can_be_cancelled() {
        let launcher = stub();
        let registry = PlayerRegistry::new(launcher.clone()).await.unwrap();
        let (owner, _rx) = mpsc::unbounded_channel();

        let id = registry.allocate(spec(), owner, true).await;
        assert!(registry.forward_control(id, true).await.is_err());

        registry.quit(id).await.unwrap();
        assert_eq!(registry.state(id).await, Some(PlayerState::Stopped));

        // Un déclenchement périmé ne ressuscite pas le player.
        registry.fire_scheduled(id).await;
        assert_eq!(registry.state(id).await, Some(PlayerState::Stopped));
        assert!(launcher.exits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected() {
        let registry = PlayerRegistry::new(stub()).await.unwrap();
        assert!(matches!(
            registry.quit(42).await,
            Err(MasterError::UnknownPlayer(42))
        ));
        assert!(registry.forward_control(7, false).await.is_err());
    }
}
