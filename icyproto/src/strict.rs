//! Parsing décimal strict des champs numériques du protocole.
//!
//! `str::parse` accepte `+1` et les chaînes surlongues ; les protocoles du
//! master et du player exigent des chiffres ASCII uniquement, sans signe,
//! sans zéros de tête et sans résidu.

/// Parse un numéro de port : chiffres uniquement, pas de zéro de tête,
/// valeur dans `1..=65535`.
pub fn parse_port(value: &str) -> Option<u16> {
    let n = parse_decimal(value, 5)?;
    if n == 0 || n > u16::MAX as u32 {
        return None;
    }
    Some(n as u16)
}

/// Parse un entier non négatif (durées notamment), mêmes règles de syntaxe.
pub fn parse_decimal(value: &str, max_digits: usize) -> Option<u32> {
    if value.is_empty() || value.len() > max_digits {
        return None;
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if value.len() > 1 && value.starts_with('0') {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_ports() {
        assert_eq!(parse_port("1"), Some(1));
        assert_eq!(parse_port("8602"), Some(8602));
        assert_eq!(parse_port("65535"), Some(65535));
    }

    #[test]
    fn rejects_invalid_ports() {
        for bad in [
            "0",
            "-1",
            "+1",
            "65536",
            "65538",
            "089043284023823099",
            "89043284023823099",
            "r",
            " ",
            "",
            "8602 ",
            "08602",
        ] {
            assert_eq!(parse_port(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn decimal_allows_zero_but_not_leading_zeros() {
        assert_eq!(parse_decimal("0", 9), Some(0));
        assert_eq!(parse_decimal("3600", 9), Some(3600));
        assert_eq!(parse_decimal("007", 9), None);
        assert_eq!(parse_decimal("1e3", 9), None);
    }
}
