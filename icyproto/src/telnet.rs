//! Filtre des séquences de contrôle telnet.
//!
//! Un client telnet naïf intercale des séquences de négociation préfixées
//! par IAC (0xff) n'importe où dans le flux, y compris au milieu d'un
//! argument. Le filtre est un automate à trois états pour rester correct
//! quand une séquence est coupée entre deux lectures TCP.

const IAC: u8 = 0xff;
const SB: u8 = 0xfa;
const WILL: u8 = 0xfb;
const DONT: u8 = 0xfe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Normal,
    SawIac,
    /// IAC suivi d'un verbe d'option (WILL/WONT/DO/DONT/SB) : un octet
    /// d'option reste à avaler.
    SawOptionVerb,
}

/// Automate de suppression des séquences IAC, un par connexion.
#[derive(Debug)]
pub struct TelnetFilter {
    state: FilterState,
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self {
            state: FilterState::Normal,
        }
    }

    /// Retire les séquences de contrôle de `input`, en conservant l'état
    /// entre les appels.
    pub fn filter(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            match self.state {
                FilterState::Normal => {
                    if byte == IAC {
                        self.state = FilterState::SawIac;
                    } else {
                        out.push(byte);
                    }
                }
                FilterState::SawIac => {
                    self.state = if (WILL..=DONT).contains(&byte) || byte == SB {
                        FilterState::SawOptionVerb
                    } else {
                        // Séquence à deux octets (NOP, IP, AO, IAC IAC…).
                        FilterState::Normal
                    };
                }
                FilterState::SawOptionVerb => {
                    self.state = FilterState::Normal;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::TelnetFilter;

    #[test]
    fn passes_clean_bytes_through() {
        let mut f = TelnetFilter::new();
        assert_eq!(f.filter(b"START localhost /\r\n"), b"START localhost /\r\n");
    }

    #[test]
    fn strips_three_byte_negotiation() {
        let mut f = TelnetFilter::new();
        assert_eq!(f.filter(b"ST\xff\xfe\x06ART"), b"START");
    }

    #[test]
    fn strips_two_byte_commands() {
        let mut f = TelnetFilter::new();
        assert_eq!(f.filter(b"8\xff\xf5904\xff\xf7"), b"8904");
    }

    #[test]
    fn sequence_split_across_reads_is_still_removed() {
        let mut f = TelnetFilter::new();
        let mut out = f.filter(b"yes\xff");
        out.extend(f.filter(b"\xfe"));
        out.extend(f.filter(b"\x06no"));
        assert_eq!(out, b"yesno");
    }

    #[test]
    fn several_sequences_inside_one_argument() {
        let mut f = TelnetFilter::new();
        assert_eq!(
            f.filter(b"\xff\xfb\x01local\xff\xf5host\xff\xfe\x06"),
            b"localhost"
        );
    }
}
