use crate::stats::{RankedUsage, YearlyStats, WEEKDAY_NAMES};
use crate::view::fmt::{fmt_cost, fmt_count, fmt_tokens};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use resvg::{tiny_skia, usvg};

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 630;

const MARGIN: f64 = 60.0;
const CELL: f64 = 14.0;
const CELL_GAP: f64 = 4.0;
const HEATMAP_Y: f64 = 398.0;

const BG: &str = "#0d1117";
const FG: &str = "#e6edf3";
const FG_DIM: &str = "#8b949e";
const ACCENT: &str = "#39d353";
// GitHub-dark activity scale, zero first.
const SCALE: [&str; 5] = ["#161b22", "#0e4429", "#006d32", "#26a641", "#39d353"];

pub struct CardImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    /// Straight (non-premultiplied) RGBA, for the clipboard.
    pub rgba: Vec<u8>,
}

pub fn render(stats: &YearlyStats) -> Result<CardImage> {
    let svg = build_svg(stats);

    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(&svg, &opt).context("card svg failed to parse")?;

    let mut pixmap =
        tiny_skia::Pixmap::new(WIDTH, HEIGHT).context("card pixmap allocation failed")?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let png = pixmap.encode_png().context("png encoding failed")?;
    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    Ok(CardImage {
        width: WIDTH,
        height: HEIGHT,
        png,
        rgba,
    })
}

pub(crate) fn build_svg(stats: &YearlyStats) -> String {
    let mut svg = String::with_capacity(32 * 1024);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="{BG}"/>"#
    ));

    header(&mut svg, stats);
    stat_tiles(&mut svg, stats);
    ranked_column(&mut svg, MARGIN, "TOP MODELS", &stats.top_models);
    ranked_column(&mut svg, 630.0, "TOP PROVIDERS", &stats.top_providers);
    heatmap(&mut svg, stats);
    footer(&mut svg, stats);

    svg.push_str("</svg>");
    svg
}

fn header(svg: &mut String, stats: &YearlyStats) {
    text(svg, MARGIN, 92.0, 52.0, FG, "700", &format!("recap {}", stats.year));
    let active_days = stats.daily_messages.len();
    let mut sub = format!("{active_days} active days");
    if stats.days_since_first_session > 0 {
        sub.push_str(&format!(
            " · first session {} days ago",
            stats.days_since_first_session
        ));
    }
    text(svg, MARGIN, 124.0, 17.0, FG_DIM, "400", &sub);
}

fn stat_tiles(svg: &mut String, stats: &YearlyStats) {
    let spend = stats.metered_cost + stats.estimated_cost;
    let tiles = [
        (fmt_count(stats.total_messages), "MESSAGES".to_string()),
        (fmt_tokens(stats.total_tokens), "TOKENS".to_string()),
        (fmt_count(stats.total_sessions), "SESSIONS".to_string()),
        (
            if spend > 0.0 {
                fmt_cost(spend)
            } else {
                "—".to_string()
            },
            "SPEND".to_string(),
        ),
    ];
    for (i, (value, label)) in tiles.iter().enumerate() {
        let x = MARGIN + i as f64 * 285.0;
        text(svg, x, 204.0, 40.0, ACCENT, "700", value);
        text(svg, x, 230.0, 13.0, FG_DIM, "400", label);
    }
}

fn ranked_column(svg: &mut String, x: f64, label: &str, ranked: &[RankedUsage]) {
    if ranked.is_empty() {
        return;
    }
    text(svg, x, 282.0, 13.0, FG_DIM, "400", label);
    for (i, r) in ranked.iter().enumerate() {
        let y = 312.0 + i as f64 * 28.0;
        text(
            svg,
            x,
            y,
            19.0,
            FG,
            "400",
            &format!("{}. {}", i + 1, r.display_name),
        );
        text(svg, x + 430.0, y, 19.0, FG_DIM, "400", &format!("{}%", r.percent));
    }
}

fn heatmap(svg: &mut String, stats: &YearlyStats) {
    let Some(jan1) = NaiveDate::from_ymd_opt(stats.year, 1, 1) else {
        return;
    };
    let max = stats.daily_messages.values().copied().max().unwrap_or(0);
    let offset = jan1.weekday().num_days_from_monday() as i64;
    let step = CELL + CELL_GAP;

    let mut day = jan1;
    while day.year() == stats.year {
        let index = offset + (day - jan1).num_days();
        let x = MARGIN + (index / 7) as f64 * step;
        let y = HEATMAP_Y + (index % 7) as f64 * step;
        let key = crate::stats::day_key(day);
        let count = stats.daily_messages.get(&key).copied().unwrap_or(0);
        let fill = SCALE[level(count, max)];
        let outline = if stats.max_streak_days.contains(&key) {
            format!(r#" stroke="{FG}" stroke-width="1""#)
        } else {
            String::new()
        };
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" rx="3" fill="{fill}"{outline}/>"#
        ));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
}

fn footer(svg: &mut String, stats: &YearlyStats) {
    let mut parts = Vec::new();
    if stats.max_streak > 0 {
        parts.push(format!(
            "longest streak {} day{}",
            stats.max_streak,
            if stats.max_streak != 1 { "s" } else { "" }
        ));
    }
    if stats.current_streak > 0 {
        parts.push(format!("current streak {}", stats.current_streak));
    }
    if let Some((day, count)) = &stats.busiest_day {
        parts.push(format!("busiest day {day} ({} messages)", fmt_count(*count)));
    }
    if let Some(i) = stats.busiest_weekday {
        parts.push(format!("most active on {}s", WEEKDAY_NAMES[i]));
    }
    if !parts.is_empty() {
        text(svg, MARGIN, 586.0, 17.0, FG_DIM, "400", &parts.join(" · "));
    }
    text(svg, 1015.0, 586.0, 15.0, FG_DIM, "400", "opencode");
}

/// 0 for an empty day, else quartiles of the year's maximum.
fn level(count: u64, max: u64) -> usize {
    if count == 0 || max == 0 {
        return 0;
    }
    (count * 4).div_ceil(max).min(4) as usize
}

fn text(svg: &mut String, x: f64, y: f64, size: f64, fill: &str, weight: &str, content: &str) {
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" fill="{fill}" font-weight="{weight}">{}</text>"#,
        esc(content)
    ));
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
