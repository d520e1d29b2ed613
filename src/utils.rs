/// Format a buffer as a 16-bytes-per-line hexdump with an ASCII column,
/// addressed from `base`.
pub fn hexdump(buffer: &[u8], base: u16) -> String {
    let mut out = String::new();
    for (i, chunk) in buffer.chunks(16).enumerate() {
        let mut line = format!("{:04x}: ", base.wrapping_add((i * 16) as u16));
        let mut chars = String::new();
        for &byte in chunk {
            line.push_str(&format!("{:02x} ", byte));
            let c = byte as char;
            chars.push(if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '.'
            });
        }
        out.push_str(&format!("{:<54} {}\n", line, chars));
    }
    out
}

/// Hexdump a sub-range of a larger buffer, keeping its original addresses.
pub fn partial_hexdump(buffer: &[u8], start: u16, end: u16) -> String {
    hexdump(&buffer[start as usize..end as usize], start)
}
