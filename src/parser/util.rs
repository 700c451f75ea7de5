/// Cooked value of a string literal.
#[derive(Debug, PartialEq)]
pub struct DecodedString {
    pub value: String,
    /// Set when a legacy octal escape was seen; those are early errors in strict code.
    pub has_octal_escape: bool,
}

fn hex_value(chars: &[char], start: usize, count: usize) -> Option<u32> {
    if start + count > chars.len() {
        return None;
    }
    let mut v = 0;
    for c in &chars[start..start + count] {
        v = v * 16 + c.to_digit(16)?;
    }
    Some(v)
}

fn push_char(units: &mut Vec<u16>, c: char) {
    let mut buf = [0u16; 2];
    units.extend_from_slice(c.encode_utf16(&mut buf));
}

/// Decodes a quoted string literal. Code units are collected as UTF-16 so that surrogate pairs
/// written as two `\u` escapes come out as one character.
pub fn decode_string_literal(raw: &str) -> Result<DecodedString, String> {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 2 {
        return Err("Unterminated string literal".to_string());
    }
    let body = &chars[1..chars.len() - 1];
    let mut units = Vec::with_capacity(body.len());
    let mut has_octal_escape = false;
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if c != '\\' {
            push_char(&mut units, c);
            i += 1;
            continue;
        }
        i += 1;
        let e = match body.get(i) {
            Some(e) => *e,
            None => return Err("Invalid escape at end of string".to_string()),
        };
        i += 1;
        match e {
            'b' => units.push(0x08),
            't' => units.push(0x09),
            'n' => units.push(0x0A),
            'v' => units.push(0x0B),
            'f' => units.push(0x0C),
            'r' => units.push(0x0D),
            '\r' => {
                if body.get(i) == Some(&'\n') {
                    i += 1;
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let v = hex_value(body, i, 2).ok_or("Invalid hexadecimal escape sequence")?;
                units.push(v as u16);
                i += 2;
            }
            'u' => {
                let v = hex_value(body, i, 4).ok_or("Invalid Unicode escape sequence")?;
                units.push(v as u16);
                i += 4;
            }
            '0'..='7' => {
                let next_is_digit = body.get(i).map_or(false, |d| d.is_ascii_digit());
                if e == '0' && !next_is_digit {
                    units.push(0);
                    continue;
                }
                has_octal_escape = true;
                let max_len = if e <= '3' { 3 } else { 2 };
                let mut v = e as u32 - '0' as u32;
                let mut len = 1;
                while len < max_len {
                    match body.get(i) {
                        Some(d @ '0'..='7') => {
                            v = v * 8 + (*d as u32 - '0' as u32);
                            i += 1;
                            len += 1;
                        }
                        _ => break,
                    }
                }
                units.push(v as u16);
            }
            other => push_char(&mut units, other),
        }
    }
    Ok(DecodedString {
        value: String::from_utf16_lossy(&units),
        has_octal_escape,
    })
}

/// Resolves `\uXXXX` escapes inside an identifier name.
pub fn decode_identifier(raw: &str) -> Result<String, String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            let v = hex_value(&chars, i + 2, 4).ok_or("Invalid Unicode escape sequence")?;
            let c = std::char::from_u32(v).ok_or("Invalid Unicode escape sequence")?;
            out.push(c);
            i += 6;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Value of a numeric literal. Returns whether the literal used the legacy octal form.
pub fn parse_numeric_literal(raw: &str) -> (f64, bool) {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        let v = raw[2..].chars().fold(0.0, |acc, c| {
            acc * 16.0 + f64::from(c.to_digit(16).unwrap_or(0))
        });
        return (v, false);
    }
    if raw.len() > 1 && raw.starts_with('0') && raw.chars().all(|c| ('0'..='7').contains(&c)) {
        let v = raw[1..]
            .chars()
            .fold(0.0, |acc, c| acc * 8.0 + f64::from(c as u32 - '0' as u32));
        return (v, true);
    }
    let normalized = raw.replace(".e", ".0e").replace(".E", ".0E");
    (normalized.parse::<f64>().unwrap_or(f64::NAN), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_escapes() {
        let d = decode_string_literal(r#""a\tb\n\x41B""#).unwrap();
        assert_eq!(d.value, "a\tb\nAB");
        assert!(!d.has_octal_escape);
    }

    #[test]
    fn test_octal_escapes_are_flagged() {
        let d = decode_string_literal(r#"'\101\0'"#).unwrap();
        assert_eq!(d.value, "A\u{0}");
        assert!(d.has_octal_escape);
        assert!(!decode_string_literal(r#"'\0'"#).unwrap().has_octal_escape);
    }

    #[test]
    fn test_surrogate_pair_escapes() {
        let d = decode_string_literal(r#""\uD83D\uDE00""#).unwrap();
        assert_eq!(d.value, "\u{1F600}");
    }

    #[test]
    fn test_line_continuation() {
        let d = decode_string_literal("'a\\\nb'").unwrap();
        assert_eq!(d.value, "ab");
    }

    #[test]
    fn test_bad_hex_escape() {
        assert!(decode_string_literal(r#""\xZ1""#).is_err());
    }

    #[test]
    fn test_identifier_escape() {
        assert_eq!(decode_identifier(r"a\u0062c").unwrap(), "abc");
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(parse_numeric_literal("0x1F"), (31.0, false));
        assert_eq!(parse_numeric_literal("017"), (15.0, true));
        assert_eq!(parse_numeric_literal("09"), (9.0, false));
        assert_eq!(parse_numeric_literal("1.5e3"), (1500.0, false));
        assert_eq!(parse_numeric_literal("5."), (5.0, false));
        assert_eq!(parse_numeric_literal(".25"), (0.25, false));
    }
}
