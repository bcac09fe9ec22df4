/// Deterministic faction color via CRC32 hash of the faction id.
/// Returns (r, g, b) from first 3 bytes of hash.
pub fn faction_color(faction_id: &str) -> (u8, u8, u8) {
    let hash = crc32fast::hash(faction_id.as_bytes());
    let bytes = hash.to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// [`faction_color`] rendered as a CSS hex string (`#rrggbb`).
pub fn faction_color_hex(faction_id: &str) -> String {
    let (r, g, b) = faction_color(faction_id);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Pick the display color for a faction: the supplied color when present,
/// otherwise the hash-derived fallback.
pub fn display_color(supplied: &str, faction_id: &str) -> String {
    let trimmed = supplied.trim();
    if trimmed.is_empty() {
        faction_color_hex(faction_id)
    } else {
        trimmed.to_string()
    }
}
