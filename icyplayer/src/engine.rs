//! Moteur d'une session de streaming.
//!
//! États : CONNECTING → NEGOTIATING → STREAMING ⇄ PAUSED → EXITING, avec
//! FAILED accessible partout (violation de protocole ou silence de la
//! source). Une seule tâche multiplexe la socket source, le canal de
//! contrôle et l'échéance de timeout ; le contrôle est prioritaire pour ne
//! jamais être affamé par une lecture de flux en attente.

use std::time::Duration;

use icyproto::{find_header_end, stream_title, DemuxEvent, IcyDemuxer, IcyRequest, IcyResponseHead};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::control::{ControlChannel, ControlCommand};
use crate::sink::AudioSink;
use crate::{PlayerArgs, PlayerError};

const READ_CHUNK: usize = 8192;

/// Réglages du moteur. Le timeout d'attente est mesuré depuis le dernier
/// octet reçu de la source, pas depuis le début de session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wait_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
        }
    }
}

pub struct PlayerEngine {
    args: PlayerArgs,
    config: EngineConfig,
}

impl PlayerEngine {
    pub fn new(args: PlayerArgs) -> Self {
        Self::with_config(args, EngineConfig::default())
    }

    pub fn with_config(args: PlayerArgs, config: EngineConfig) -> Self {
        Self { args, config }
    }

    /// Déroule la session complète. `Ok(())` correspond au code de sortie 0
    /// (QUIT ou fin de flux propre), toute erreur au code 1.
    pub async fn run(self) -> Result<(), PlayerError> {
        let wait = self.config.wait_timeout;

        // Le canal de contrôle est lié avant la connexion : TITLE doit
        // répondre (titre vide) même pendant la négociation.
        let control = ControlChannel::bind(self.args.control_port).await?;
        let sink = AudioSink::create(&self.args.output).await?;

        let mut session = Session {
            control,
            sink,
            title: String::new(),
            paused: false,
        };

        info!(
            host = %self.args.host,
            port = self.args.port,
            metadata = self.args.want_metadata,
            "connecting to source"
        );
        let mut stream = match tokio::time::timeout(
            wait,
            TcpStream::connect((self.args.host.as_str(), self.args.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(PlayerError::Connect {
                    host: self.args.host.clone(),
                    port: self.args.port,
                    source,
                })
            }
            Err(_) => return Err(PlayerError::DataTimeout(wait)),
        };

        let request = IcyRequest::new(
            self.args.host.clone(),
            self.args.path.clone(),
            self.args.want_metadata,
        );
        stream.write_all(&request.to_bytes()).await?;

        let (head, leftover) = match negotiate(&mut stream, &mut session, wait).await? {
            Negotiated::Header(head, leftover) => (head, leftover),
            Negotiated::Quit => {
                session.sink.shutdown().await?;
                return Ok(());
            }
        };
        info!(status = head.status, metaint = ?head.metaint, "source accepted the request");

        let mut demux = IcyDemuxer::new(head.metaint);
        session.consume(&mut demux, &leftover).await?;

        let mut deadline = Instant::now() + wait;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            tokio::select! {
                biased;
                (command, peer) = session.control.recv() => {
                    match command {
                        ControlCommand::Play => {
                            debug!("resuming sink writes");
                            session.paused = false;
                        }
                        ControlCommand::Pause => {
                            debug!("pausing sink writes, draining source");
                            session.paused = true;
                        }
                        ControlCommand::Title => {
                            session.control.send_title(peer, &session.title).await;
                        }
                        ControlCommand::Quit => {
                            info!(bytes = session.sink.bytes_written(), "QUIT received, ending session");
                            session.sink.shutdown().await?;
                            return Ok(());
                        }
                    }
                }
                read = stream.read(&mut chunk) => {
                    match read? {
                        0 => {
                            // Fin de flux après l'en-tête : sortie propre,
                            // même au milieu d'un bloc de métadonnées.
                            info!(bytes = session.sink.bytes_written(), "source closed the connection, end of stream");
                            session.sink.shutdown().await?;
                            return Ok(());
                        }
                        n => {
                            deadline = Instant::now() + wait;
                            session.consume(&mut demux, &chunk[..n]).await?;
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    return Err(PlayerError::DataTimeout(wait));
                }
            }
        }
    }
}

struct Session {
    control: ControlChannel,
    sink: AudioSink,
    title: String,
    paused: bool,
}

impl Session {
    /// Passe un segment reçu au démultiplexeur et route les événements :
    /// audio vers le sink (jeté si en pause), métadonnées vers le titre.
    async fn consume(&mut self, demux: &mut IcyDemuxer, bytes: &[u8]) -> Result<(), PlayerError> {
        for event in demux.push(bytes) {
            match event {
                DemuxEvent::Audio(audio) => {
                    if !self.paused {
                        self.sink.write(&audio).await?;
                    }
                }
                DemuxEvent::Metadata(block) => {
                    if let Some(title) = stream_title(&block) {
                        debug!(%title, "stream title updated");
                        self.title = title;
                    }
                }
            }
        }
        Ok(())
    }
}

enum Negotiated {
    Header(IcyResponseHead, Vec<u8>),
    Quit,
}

/// Lit la ligne de statut et les en-têtes jusqu'à la ligne vide.
///
/// Les octets du corps arrivés dans la même lecture sont rendus à
/// l'appelant. Le canal de contrôle reste servi pendant l'attente.
async fn negotiate(
    stream: &mut TcpStream,
    session: &mut Session,
    wait: Duration,
) -> Result<Negotiated, PlayerError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; READ_CHUNK];
    let mut deadline = Instant::now() + wait;
    loop {
        tokio::select! {
            biased;
            (command, peer) = session.control.recv() => {
                match command {
                    ControlCommand::Title => {
                        session.control.send_title(peer, &session.title).await;
                    }
                    ControlCommand::Quit => return Ok(Negotiated::Quit),
                    ControlCommand::Play | ControlCommand::Pause => {
                        session.paused = matches!(command, ControlCommand::Pause);
                    }
                }
            }
            read = stream.read(&mut chunk) => {
                match read? {
                    0 => return Err(PlayerError::HeaderEof),
                    n => {
                        deadline = Instant::now() + wait;
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(body_start) = find_header_end(&buf) {
                            let head = IcyResponseHead::parse(&buf[..body_start - 2])?;
                            return Ok(Negotiated::Header(head, buf.split_off(body_start)));
                        }
                        if buf.len() > 64 * 1024 {
                            warn!("header block exceeds 64 KiB, giving up");
                            return Err(PlayerError::HeaderEof);
                        }
                    }
                }
            }
            _ = sleep_until(deadline) => {
                return Err(PlayerError::DataTimeout(wait));
            }
        }
    }
}
