//! Démultiplexage incrémental du flux audio/métadonnées.
//!
//! Avec un `icy-metaint` de N, le flux alterne N octets d'audio, un octet de
//! longueur L (en unités de 16 octets) puis `16*L` octets de métadonnées.
//! L'automate tolère des lectures partielles arbitraires : un bloc de
//! métadonnées coupé entre deux lectures est mis en tampon et n'est émis
//! qu'une fois complet.

use bytes::Bytes;

/// Événement produit par [`IcyDemuxer::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    /// Octets d'audio, à écrire tels quels dans le sink.
    Audio(Bytes),
    /// Bloc de métadonnées complet (jamais vide).
    Metadata(Bytes),
}

#[derive(Debug)]
enum DemuxState {
    /// Octets d'audio restants avant le prochain octet de longueur.
    Audio { remaining: usize },
    MetaLength,
    /// Bloc de métadonnées en cours d'accumulation.
    Meta { remaining: usize, buffer: Vec<u8> },
}

/// Automate de démultiplexage d'un flux ICY.
#[derive(Debug)]
pub struct IcyDemuxer {
    metaint: Option<u32>,
    state: DemuxState,
}

impl IcyDemuxer {
    pub fn new(metaint: Option<u32>) -> Self {
        let metaint = metaint.filter(|n| *n > 0);
        let state = match metaint {
            Some(n) => DemuxState::Audio {
                remaining: n as usize,
            },
            None => DemuxState::Audio { remaining: 0 },
        };
        Self { metaint, state }
    }

    /// Consomme un segment reçu du réseau et produit les événements complets.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DemuxEvent> {
        let Some(metaint) = self.metaint else {
            // Pas de framing : tout est audio.
            if chunk.is_empty() {
                return Vec::new();
            }
            return vec![DemuxEvent::Audio(Bytes::copy_from_slice(chunk))];
        };
        let metaint = metaint as usize;

        let mut events = Vec::new();
        let mut input = chunk;
        while !input.is_empty() {
            match &mut self.state {
                DemuxState::Audio { remaining } => {
                    let take = (*remaining).min(input.len());
                    if take > 0 {
                        events.push(DemuxEvent::Audio(Bytes::copy_from_slice(&input[..take])));
                        *remaining -= take;
                        input = &input[take..];
                    }
                    if *remaining == 0 {
                        self.state = DemuxState::MetaLength;
                    }
                }
                DemuxState::MetaLength => {
                    let length = input[0] as usize * 16;
                    input = &input[1..];
                    self.state = if length == 0 {
                        DemuxState::Audio { remaining: metaint }
                    } else {
                        DemuxState::Meta {
                            remaining: length,
                            buffer: Vec::with_capacity(length),
                        }
                    };
                }
                DemuxState::Meta { remaining, buffer } => {
                    let take = (*remaining).min(input.len());
                    buffer.extend_from_slice(&input[..take]);
                    *remaining -= take;
                    input = &input[take..];
                    if *remaining == 0 {
                        let block = std::mem::take(buffer);
                        events.push(DemuxEvent::Metadata(Bytes::from(block)));
                        self.state = DemuxState::Audio { remaining: metaint };
                    }
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_total(events: &[DemuxEvent]) -> usize {
        events
            .iter()
            .filter_map(|e| match e {
                DemuxEvent::Audio(b) => Some(b.len()),
                _ => None,
            })
            .sum()
    }

    fn metadata_blocks(events: &[DemuxEvent]) -> Vec<Bytes> {
        events
            .iter()
            .filter_map(|e| match e {
                DemuxEvent::Metadata(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn without_metaint_everything_is_audio() {
        let mut demux = IcyDemuxer::new(None);
        let events = demux.push(&[0u8; 100]);
        assert_eq!(audio_total(&events), 100);
        assert!(metadata_blocks(&events).is_empty());
    }

    #[test]
    fn zero_length_cycles_emit_only_audio() {
        let mut demux = IcyDemuxer::new(Some(16));
        let mut audio = 0;
        for _ in 0..1000 {
            let mut cycle = vec![b'Z'; 16];
            cycle.push(0);
            let events = demux.push(&cycle);
            audio += audio_total(&events);
            assert!(metadata_blocks(&events).is_empty());
        }
        assert_eq!(audio, 16_000);
    }

    #[test]
    fn metadata_block_is_separated_from_audio() {
        let mut demux = IcyDemuxer::new(Some(16));
        let mut cycle = vec![b'Z'; 16];
        cycle.push(2);
        cycle.extend_from_slice(b"StreamTitle='title of the song';");
        let events = demux.push(&cycle);
        assert_eq!(audio_total(&events), 16);
        let blocks = metadata_blocks(&events);
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0][..], b"StreamTitle='title of the song';");
    }

    #[test]
    fn split_reads_do_not_corrupt_framing() {
        let mut demux = IcyDemuxer::new(Some(16));
        let mut stream = vec![b'Z'; 16];
        stream.push(2);
        stream.extend_from_slice(b"StreamTitle='split across reads';");
        stream.extend_from_slice(&[b'Z'; 16]);
        stream.push(0);

        // Injecte octet par octet, pire cas de fragmentation.
        let mut audio = 0;
        let mut blocks = Vec::new();
        for byte in stream {
            let events = demux.push(&[byte]);
            audio += audio_total(&events);
            blocks.extend(metadata_blocks(&events));
        }
        assert_eq!(audio, 32);
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0][..], b"StreamTitle='split across reads';");
    }

    #[test]
    fn incomplete_metadata_is_withheld() {
        let mut demux = IcyDemuxer::new(Some(16));
        let mut cycle = vec![b'Z'; 16];
        cycle.push(0x50); // annonce 0x50 * 16 octets, jamais envoyés en entier
        cycle.extend_from_slice(b"StreamTitle='title of the song';");
        let events = demux.push(&cycle);
        assert_eq!(audio_total(&events), 16);
        assert!(metadata_blocks(&events).is_empty());
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut demux = IcyDemuxer::new(Some(16));
        assert!(demux.push(&[]).is_empty());
    }
}
