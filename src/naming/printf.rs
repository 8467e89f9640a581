//! printf-style integer formatting for `{sequence:...}` tokens.
//!
//! Supports `[prefix]%[flags][width][.precision]conv[suffix]` with flags
//! `-+ 0#` and conversions `d i u x X o`. The leading `%` may be omitted,
//! so `03d` and `%03d` are equivalent.

const MAX_WIDTH: usize = 256;

#[derive(Debug, Default, PartialEq)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conv: char,
}

/// Format `value` with a printf-style directive. `None` if it is invalid.
pub fn format_int(spec: &str, value: i64) -> Option<String> {
    let (prefix, rest) = match spec.find('%') {
        Some(i) => (&spec[..i], &spec[i + 1..]),
        None => ("", spec),
    };
    let (parsed, suffix) = parse(rest)?;
    if suffix.contains('%') {
        return None;
    }
    Some(format!("{prefix}{}{suffix}", render(&parsed, value)))
}

fn take_number(s: &str) -> Option<(usize, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return Some((0, s));
    }
    let n: usize = s[..end].parse().ok()?;
    if n > MAX_WIDTH {
        return None;
    }
    Some((n, &s[end..]))
}

fn parse(s: &str) -> Option<(Spec, &str)> {
    let mut spec = Spec::default();
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        match c {
            '-' => spec.left = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '0' => spec.zero = true,
            '#' => spec.alt = true,
            _ => break,
        }
        rest = &rest[1..];
    }

    let (width, after) = take_number(rest)?;
    spec.width = width;
    rest = after;

    if let Some(after_dot) = rest.strip_prefix('.') {
        let (precision, after) = take_number(after_dot)?;
        spec.precision = Some(precision);
        rest = after;
    }

    let conv = rest.chars().next()?;
    if !matches!(conv, 'd' | 'i' | 'u' | 'x' | 'X' | 'o') {
        return None;
    }
    spec.conv = conv;
    Some((spec, &rest[1..]))
}

fn render(spec: &Spec, value: i64) -> String {
    let magnitude = value.unsigned_abs();
    let mut digits = match spec.conv {
        'x' => format!("{magnitude:x}"),
        'X' => format!("{magnitude:X}"),
        'o' => format!("{magnitude:o}"),
        _ => magnitude.to_string(),
    };
    if let Some(p) = spec.precision {
        if digits.len() < p {
            digits = format!("{}{digits}", "0".repeat(p - digits.len()));
        }
    }

    let sign = if value < 0 {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    let radix_prefix = match (spec.alt, spec.conv) {
        (true, 'x') => "0x",
        (true, 'X') => "0X",
        (true, 'o') => "0o",
        _ => "",
    };

    let body_len = sign.len() + radix_prefix.len() + digits.len();
    let pad = spec.width.saturating_sub(body_len);
    if spec.left {
        format!("{sign}{radix_prefix}{digits}{}", " ".repeat(pad))
    } else if spec.zero && spec.precision.is_none() {
        format!("{sign}{radix_prefix}{}{digits}", "0".repeat(pad))
    } else {
        format!("{}{sign}{radix_prefix}{digits}", " ".repeat(pad))
    }
}
