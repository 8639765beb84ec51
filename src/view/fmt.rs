use std::sync::OnceLock;

static COLOR: OnceLock<bool> = OnceLock::new();

pub(crate) fn use_color() -> bool {
    *COLOR.get_or_init(|| std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout))
}

pub(crate) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_esc = false;
    for ch in s.chars() {
        if in_esc {
            if ch == 'm' {
                in_esc = false;
            }
        } else if ch == '\x1b' {
            in_esc = true;
        } else {
            out.push(ch);
        }
    }
    out
}

macro_rules! cprintln {
    () => { println!() };
    ($($arg:tt)*) => {{
        let s = format!($($arg)*);
        if $crate::view::fmt::use_color() {
            println!("{s}");
        } else {
            println!("{}", $crate::view::fmt::strip_ansi(&s));
        }
    }};
}
pub(crate) use cprintln;

macro_rules! ceprintln {
    () => { eprintln!() };
    ($($arg:tt)*) => {{
        let s = format!($($arg)*);
        if $crate::view::fmt::use_color() {
            eprintln!("{s}");
        } else {
            eprintln!("{}", $crate::view::fmt::strip_ansi(&s));
        }
    }};
}
pub(crate) use ceprintln;

pub(crate) const RESET: &str = "\x1b[0m";
pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const DIM: &str = "\x1b[2m";
pub(crate) const CYAN: &str = "\x1b[36m";
pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const YELLOW: &str = "\x1b[33m";

pub(crate) fn fmt_tokens(n: u64) -> String {
    match n {
        n if n >= 1_000_000_000 => format!("{:.1}B", n as f64 / 1_000_000_000.0),
        n if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n if n >= 1_000 => format!("{}K", n / 1_000),
        n => n.to_string(),
    }
}

/// Thousands separators for exact counts: 56789 → "56,789".
pub(crate) fn fmt_count(n: u64) -> String {
    let digits = n.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let mut out = String::with_capacity(digits.len() + (digits.len() - 1) / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn fmt_cost(usd: f64) -> String {
    match usd {
        usd if usd < 0.001 => format!("${usd:.5}"),
        usd if usd < 1.0 => format!("${usd:.4}"),
        usd => format!("${usd:.2}"),
    }
}

pub(crate) fn trunc(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .nth(max.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(max.saturating_sub(1));
        format!("{}…", &s[..end])
    }
}
