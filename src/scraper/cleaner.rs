/// Normalise gauge text: drop `>` separators left over from nested markup
/// and every character outside printable ASCII `0x20..=0x7D`.
/// "\n  4 >\u{a0}High" → "  4 High"
pub fn clean_text(s: &str) -> String {
    s.chars()
        .filter(|&c| c != '>' && ('\x20'..='\x7d').contains(&c))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_markers_and_non_printables() {
        assert_eq!(clean_text("4>High"), "4High");
        assert_eq!(clean_text("\t3\r\n"), "3");
        assert_eq!(clean_text("5 ~ Low\u{7f}"), "5  Low");
        assert_eq!(clean_text("é9°"), "9");
        assert_eq!(clean_text("{}|"), "{}|");
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        for s in ["", ">>>", "a > b\n\u{2603} ~c", "  12  ", "\u{0}\u{1f}x\u{7e}"] {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once);
            assert!(once.chars().all(|c| c != '>' && (' '..='}').contains(&c)));
        }
    }
}
