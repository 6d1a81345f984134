//! Boucle d'acceptation TCP et protocole ligne par connexion.
//!
//! Chaque connexion opérateur est servie par une tâche indépendante :
//! lecture brute → filtre telnet → découpe en lignes → dispatch. Les
//! réponses synchrones et les notifications de crash passent par le même
//! canal sortant, ce qui les sérialise sur la socket sans les bloquer
//! mutuellement.

use std::sync::Arc;

use chrono::Local;
use icyproto::TelnetFilter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{parse_command, Command, CommandError};
use crate::model::PlayerId;
use crate::registry::PlayerRegistry;
use crate::scheduler::{next_occurrence, ScheduledAction, Scheduler};
use crate::PlayerLauncher;

pub struct MasterServer {
    listener: TcpListener,
    registry: Arc<PlayerRegistry>,
    scheduler: Arc<Scheduler>,
    shutdown: CancellationToken,
}

impl MasterServer {
    /// Lie le port de contrôle (0 = éphémère) et arme l'ordonnanceur.
    pub async fn bind(
        port: u16,
        launcher: Arc<dyn PlayerLauncher>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let registry = PlayerRegistry::new(launcher).await?;
        let scheduler = Scheduler::new();
        scheduler.spawn(Arc::clone(&registry));
        Ok(Self {
            listener,
            registry,
            scheduler,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Jeton d'arrêt : l'annuler fait sortir `serve`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Boucle d'acceptation, une tâche par connexion opérateur.
    pub async fn serve(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("master shutting down");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "control connection accepted");
                        let registry = Arc::clone(&self.registry);
                        let scheduler = Arc::clone(&self.scheduler);
                        tokio::spawn(handle_connection(stream, registry, scheduler));
                    }
                    Err(e) => warn!("accept failed: {e}"),
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<PlayerRegistry>,
    scheduler: Arc<Scheduler>,
) {
    let (mut reader, writer) = stream.into_split();

    // Toutes les lignes sortantes (réponses et notifications asynchrones)
    // convergent ici ; l'écrivain ajoute le CRLF.
    let (lines, lines_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_lines(writer, lines_rx));

    // Les crashs arrivent du registre sous forme d'id.
    let (crash_tx, mut crash_rx) = mpsc::unbounded_channel::<PlayerId>();
    let crash_lines = lines.clone();
    let crash_task = tokio::spawn(async move {
        while let Some(id) = crash_rx.recv().await {
            if crash_lines.send(format!("ERROR {id}")).is_err() {
                break;
            }
        }
    });

    let mut filter = TelnetFilter::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    'conn: loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("control connection read error: {e}");
                break;
            }
        };
        pending.extend(filter.filter(&chunk[..read]));
        while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let text = String::from_utf8_lossy(&line);
            if dispatch(&text, &registry, &scheduler, &crash_tx, &lines)
                .await
                .is_err()
            {
                break 'conn;
            }
        }
    }

    info!("control connection closed");
    crash_task.abort();
    drop(lines);
    let _ = writer_task.await;
}

async fn write_lines(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        debug!(%line, "reply");
        if writer.write_all(line.as_bytes()).await.is_err()
            || writer.write_all(b"\r\n").await.is_err()
        {
            break;
        }
    }
}

/// Dispatch d'une ligne de commande. `Err` si la connexion est morte.
async fn dispatch(
    line: &str,
    registry: &Arc<PlayerRegistry>,
    scheduler: &Arc<Scheduler>,
    owner: &mpsc::UnboundedSender<PlayerId>,
    lines: &mpsc::UnboundedSender<String>,
) -> Result<(), ()> {
    let reply = |text: String| lines.send(text).map_err(|_| ());

    let command = match parse_command(line) {
        Ok(None) => return Ok(()),
        Ok(Some(command)) => command,
        Err(CommandError::UnknownVerb) => {
            return reply("ERROR unrecognized command".to_string());
        }
        Err(e) => return reply(format!("ERROR {e}")),
    };

    match command {
        Command::Start(spec) => {
            if !resolves(&spec.player_host).await {
                return reply(format!("ERROR cannot resolve host {}", spec.player_host));
            }
            let id = registry.allocate(spec, owner.clone(), false).await;
            // OK d'abord : le lancement (et son éventuel crash immédiat)
            // est asynchrone.
            reply(format!("OK {id}"))?;
            let registry = Arc::clone(registry);
            tokio::spawn(async move { registry.launch(id).await });
            Ok(())
        }
        Command::At {
            hour,
            minute,
            duration_secs,
            spec,
        } => {
            if !resolves(&spec.player_host).await {
                return reply(format!("ERROR cannot resolve host {}", spec.player_host));
            }
            let id = registry.allocate(spec, owner.clone(), true).await;
            let due = next_occurrence(Local::now(), hour, minute);
            scheduler.schedule(due, ScheduledAction::Launch(id));
            scheduler.schedule(
                due + chrono::Duration::seconds(i64::from(duration_secs)),
                ScheduledAction::Stop(id),
            );
            info!(id, %due, duration_secs, "launch scheduled");
            reply(format!("OK {id}"))
        }
        Command::Quit(id) => reply(result_line(id, registry.quit(id).await)),
        Command::Play(id) => reply(result_line(id, registry.forward_control(id, false).await)),
        Command::Pause(id) => reply(result_line(id, registry.forward_control(id, true).await)),
    }
}

fn result_line(id: PlayerId, result: Result<(), crate::MasterError>) -> String {
    match result {
        Ok(()) => format!("OK {id}"),
        Err(e) => {
            debug!(id, "command rejected: {e}");
            format!("ERROR {id}")
        }
    }
}

async fn resolves(host: &str) -> bool {
    tokio::net::lookup_host((host, 0u16)).await.is_ok()
}
