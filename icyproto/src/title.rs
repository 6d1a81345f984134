//! Extraction du titre courant depuis un bloc de métadonnées ICY.

/// Cherche le motif `StreamTitle='…';` dans un bloc de métadonnées.
///
/// Retourne le texte sans les apostrophes, ou `None` si le motif est absent
/// (le titre courant ne change alors pas). Le bloc peut contenir d'autres
/// paires `clé='valeur';` ainsi que du padding NUL, ignorés.
pub fn stream_title(block: &[u8]) -> Option<String> {
    const NEEDLE: &[u8] = b"StreamTitle='";
    let start = block
        .windows(NEEDLE.len())
        .position(|w| w == NEEDLE)?
        + NEEDLE.len();
    let end = block[start..]
        .windows(2)
        .position(|w| w == b"';")
        .map(|pos| start + pos)?;
    Some(String::from_utf8_lossy(&block[start..end]).into_owned())
}
