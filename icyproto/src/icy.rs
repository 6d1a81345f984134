//! Requête sortante et en-tête de réponse ICY/SHOUTcast.
//!
//! Le dialecte ICY est un HTTP dégradé : ligne de statut, en-têtes terminés
//! par une ligne vide, puis un flux d'octets dont le découpage est gouverné
//! par l'en-tête `icy-metaint` (voir [`crate::IcyDemuxer`]).

use crate::ProtoError;

/// Requête de connexion à une source ICY.
///
/// Les serveurs SHOUTcast historiques reconnaissent l'en-tête
/// `Icy-MetaData` : `1` demande l'entrelacement des métadonnées, `0` un flux
/// audio pur. L'en-tête est émis dans les deux cas.
#[derive(Debug, Clone)]
pub struct IcyRequest {
    pub host: String,
    pub path: String,
    pub want_metadata: bool,
}

impl IcyRequest {
    pub fn new(host: impl Into<String>, path: impl Into<String>, want_metadata: bool) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            want_metadata,
        }
    }

    /// Rend la requête complète, lignes CRLF, ligne vide finale comprise.
    pub fn to_bytes(&self) -> Vec<u8> {
        let meta = if self.want_metadata { 1 } else { 0 };
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nIcy-MetaData:{}\r\nAccept: */*\r\n\r\n",
            self.path, self.host, meta
        )
        .into_bytes()
    }
}

/// En-tête de réponse déjà délimité (la ligne vide finale a été vue).
#[derive(Debug, Clone)]
pub struct IcyResponseHead {
    pub status: u32,
    /// Intervalle `icy-metaint` ; `None` si absent ou nul.
    pub metaint: Option<u32>,
}

impl IcyResponseHead {
    /// Parse le bloc d'en-tête complet (sans les octets du corps).
    ///
    /// La ligne de statut est `<proto> <code> <raison…>` ; `ICY 200 OK` et
    /// `HTTP/1.0 200 OK` sont tous deux acceptés. Tout code hors 2xx est une
    /// erreur. Les noms d'en-tête sont insensibles à la casse.
    pub fn parse(block: &[u8]) -> Result<Self, ProtoError> {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split("\r\n").filter(|l| !l.is_empty());

        let status_line = lines
            .next()
            .ok_or_else(|| ProtoError::MalformedStatusLine(String::new()))?;
        let status = parse_status_line(status_line)?;
        if !(200..300).contains(&status) {
            return Err(ProtoError::BadStatus(status));
        }

        let mut metaint = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                return Err(ProtoError::MalformedHeader(line.to_string()));
            };
            if name.trim().eq_ignore_ascii_case("icy-metaint") {
                let value = value.trim();
                let parsed: u32 = value
                    .parse()
                    .map_err(|_| ProtoError::InvalidMetaint(value.to_string()))?;
                if parsed > 0 {
                    metaint = Some(parsed);
                }
            }
        }

        Ok(Self { status, metaint })
    }
}

fn parse_status_line(line: &str) -> Result<u32, ProtoError> {
    let mut words = line.split_whitespace();
    let _proto = words
        .next()
        .ok_or_else(|| ProtoError::MalformedStatusLine(line.to_string()))?;
    let code = words
        .next()
        .ok_or_else(|| ProtoError::MalformedStatusLine(line.to_string()))?;
    code.parse()
        .map_err(|_| ProtoError::MalformedStatusLine(line.to_string()))
}

/// Position de la fin du bloc d'en-tête (`\r\n\r\n`) dans `buf`.
///
/// Retourne l'index du premier octet du corps, ou `None` si le bloc est
/// encore incomplet.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_advertises_metadata_flag() {
        let yes = IcyRequest::new("radio.example", "/", true).to_bytes();
        let no = IcyRequest::new("radio.example", "/", false).to_bytes();
        let yes = String::from_utf8(yes).unwrap();
        let no = String::from_utf8(no).unwrap();
        assert!(yes.contains("Icy-MetaData:1\r\n"));
        assert!(no.contains("Icy-MetaData:0\r\n"));
        assert!(yes.starts_with("GET / HTTP/1.0\r\n"));
        assert!(yes.ends_with("\r\n\r\n"));
    }

    #[test]
    fn parses_icy_ok_with_metaint() {
        let head = IcyResponseHead::parse(b"ICY 200 OK\r\nicy-metaint:16\r\n").unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.metaint, Some(16));
    }

    #[test]
    fn metaint_header_name_is_case_insensitive() {
        let head = IcyResponseHead::parse(b"HTTP/1.0 200 OK\r\nIcy-MetaInt: 8192\r\n").unwrap();
        assert_eq!(head.metaint, Some(8192));
    }

    #[test]
    fn zero_metaint_means_no_framing() {
        let head = IcyResponseHead::parse(b"ICY 200 OK\r\nicy-metaint:0\r\n").unwrap();
        assert_eq!(head.metaint, None);
    }

    #[test]
    fn rejects_non_success_status() {
        let err = IcyResponseHead::parse(b"ICY 404 OK\r\n").unwrap_err();
        assert!(matches!(err, ProtoError::BadStatus(404)));
    }

    #[test]
    fn rejects_garbage_status_line() {
        assert!(IcyResponseHead::parse(b"whatever\r\n").is_err());
    }

    #[test]
    fn header_end_detection() {
        assert_eq!(find_header_end(b"ICY 200 OK\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"ICY 200 OK\r\n"), None);
    }
}
