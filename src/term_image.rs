use base64::{engine::general_purpose::STANDARD, Engine};

const KITTY_CHUNK: usize = 4096;

enum Protocol {
    Iterm,
    Kitty,
}

/// Best-effort detection. Kitty advertises itself via env; iTerm2, WezTerm
/// and mintty all accept the OSC 1337 file protocol.
fn protocol() -> Option<Protocol> {
    if !atty::is(atty::Stream::Stdout) {
        return None;
    }
    if std::env::var("KITTY_WINDOW_ID").is_ok()
        || std::env::var("TERM").is_ok_and(|t| t.contains("kitty"))
    {
        return Some(Protocol::Kitty);
    }
    match std::env::var("TERM_PROGRAM").as_deref() {
        Ok("iTerm.app") | Ok("WezTerm") | Ok("mintty") => Some(Protocol::Iterm),
        _ => None,
    }
}

pub fn supports_inline() -> bool {
    protocol().is_some()
}

pub fn print_inline(png: &[u8]) {
    match protocol() {
        Some(Protocol::Iterm) => print_iterm(png),
        Some(Protocol::Kitty) => print_kitty(png),
        None => {}
    }
}

fn print_iterm(png: &[u8]) {
    let payload = STANDARD.encode(png);
    println!("\x1b]1337;File=inline=1;size={}:{payload}\x07", png.len());
}

fn print_kitty(png: &[u8]) {
    let encoded = STANDARD.encode(png);
    let mut chunks = encoded.as_bytes().chunks(KITTY_CHUNK).peekable();
    let mut first = true;
    while let Some(chunk) = chunks.next() {
        let more = if chunks.peek().is_some() { 1 } else { 0 };
        // Chunk boundaries fall on base64 output, which is pure ASCII.
        let payload = std::str::from_utf8(chunk).unwrap_or_default();
        if first {
            print!("\x1b_Gf=100,a=T,m={more};{payload}\x1b\\");
            first = false;
        } else {
            print!("\x1b_Gm={more};{payload}\x1b\\");
        }
    }
    println!();
}
