// 🔢 Quantity & Foil Parser
// Free-form export values ("2x", "x3", "Foil") → normalized numbers/flags

/// Parse a quantity string from an export row
///
/// Takes the first contiguous run of ASCII digits anywhere in the value:
/// - "2x" → 2
/// - "x3" → 3
/// - "-5" → 5 (the sign is ignored, quantities are never negative)
/// - "" / "abc" → 1
///
/// A run too large for u32 saturates instead of failing.
pub fn parse_quantity(raw: &str) -> u32 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return 1;
    }

    digits.parse::<u32>().unwrap_or(u32::MAX)
}

/// Parse a foil marker
///
/// Blank and "false" (any case, surrounding whitespace ignored) are the only
/// non-foil spellings. Everything else counts as foil: "true", "1", "yes",
/// "Foil", even arbitrary text.
pub fn parse_foil(raw: &str) -> bool {
    let value = raw.trim();
    if value.is_empty() {
        return false;
    }
    !value.eq_ignore_ascii_case("false")
}

// ============================================================================
// TESTS
// ============================================================================
