use crate::card::CardImage;
use anyhow::{Context, Result};
use arboard::{Clipboard, ImageData};
use std::borrow::Cow;

/// Best-effort: callers print a dim notice on failure and carry on.
pub fn copy_image(card: &CardImage) -> Result<()> {
    let mut clipboard = Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_image(ImageData {
            width: card.width as usize,
            height: card.height as usize,
            bytes: Cow::Borrowed(&card.rgba),
        })
        .context("failed to place image on the clipboard")?;
    Ok(())
}
