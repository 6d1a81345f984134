//! Briques protocolaires partagées entre le master et le player.
//!
//! Ce crate ne fait aucune entrée/sortie : il ne contient que des machines à
//! états incrémentales (démultiplexage ICY, filtre telnet) et le parsing des
//! en-têtes ICY. Les sockets restent dans `icyplayer` et `icymaster`.

mod demux;
mod error;
mod icy;
pub mod strict;
mod telnet;
mod title;

pub use demux::{DemuxEvent, IcyDemuxer};
pub use error::ProtoError;
pub use icy::{find_header_end, IcyRequest, IcyResponseHead};
pub use telnet::TelnetFilter;
pub use title::stream_title;
