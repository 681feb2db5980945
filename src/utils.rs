use std::fmt::Write;

/// Hexadecimal dump, 16 bytes per line with an extra space after the eighth byte.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / 16 * 8);
    for (line, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}  ", line * 16);
        for (i, b) in chunk.iter().enumerate() {
            if i == 8 {
                out.push(' ');
            }
            let _ = write!(out, "{b:02x} ");
        }
        out.pop();
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0..18).collect();
        assert_eq!(
            hex_dump(&data),
            "0000  00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f\n0010  10 11\n"
        );
        assert_eq!(hex_dump(&[]), "");
    }
}
