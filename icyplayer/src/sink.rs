//! Sink audio : fichier ou stdout.

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, Stdout};
use tracing::debug;

use crate::args::OutputTarget;

enum SinkTarget {
    Stdout(Stdout),
    File(File),
}

/// Destination d'écriture de l'audio démultiplexé.
///
/// Chaque écriture est suivie d'un flush pour que la croissance du fichier
/// soit observable de l'extérieur sans attendre la fin de session.
pub struct AudioSink {
    target: SinkTarget,
    written: u64,
}

impl AudioSink {
    pub async fn create(target: &OutputTarget) -> std::io::Result<Self> {
        let target = match target {
            OutputTarget::Stdout => SinkTarget::Stdout(tokio::io::stdout()),
            OutputTarget::File(path) => SinkTarget::File(File::create(path).await?),
        };
        Ok(Self { target, written: 0 })
    }

    pub async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.target {
            SinkTarget::Stdout(out) => {
                out.write_all(bytes).await?;
                out.flush().await?;
            }
            SinkTarget::File(file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
            }
        }
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Octets d'audio écrits depuis l'ouverture (les périodes de pause ne
    /// comptent pas).
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush final avant la sortie du processus.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        debug!(bytes = self.written, "closing sink");
        match &mut self.target {
            SinkTarget::Stdout(out) => out.shutdown().await,
            SinkTarget::File(file) => file.shutdown().await,
        }
    }
}
