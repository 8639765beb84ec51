pub(crate) mod fmt;

use crate::stats::{RankedUsage, YearlyStats, WEEKDAY_NAMES};
use fmt::{cprintln, fmt_cost, fmt_count, fmt_tokens, trunc, BOLD, CYAN, DIM, GREEN, RESET, YELLOW};

/// ANSI summary of one year. Mirrors the card's content for terminals that
/// can't show the image.
pub fn print_summary(stats: &YearlyStats) {
    println!();
    cprintln!("{DIM}── recap {} ─────────────────────────────────────{RESET}", stats.year);
    println!();
    print_totals(stats);
    print_streaks(stats);
    print_ranked("models", &stats.top_models);
    print_ranked("providers", &stats.top_providers);
    println!();
}

fn print_totals(stats: &YearlyStats) {
    cprintln!(
        "  {BOLD}{}{RESET} sessions · {BOLD}{}{RESET} messages · {BOLD}{}{RESET} projects",
        fmt_count(stats.total_sessions),
        fmt_count(stats.total_messages),
        fmt_count(stats.total_projects)
    );

    if stats.total_tokens > 0 {
        let cache_str = if stats.cache_read_tokens > 0 {
            format!(" · cache: {} read", fmt_tokens(stats.cache_read_tokens))
        } else {
            String::new()
        };
        cprintln!(
            "  tokens: {} in · {} out · {BOLD}{}{RESET} total{cache_str}",
            fmt_tokens(stats.total_input_tokens),
            fmt_tokens(stats.total_output_tokens),
            fmt_tokens(stats.total_tokens)
        );
    }

    if stats.metered_cost > 0.0 || stats.estimated_cost > 0.0 {
        let mut parts = Vec::new();
        if stats.metered_cost > 0.0 {
            parts.push(format!("{} metered", fmt_cost(stats.metered_cost)));
        }
        if stats.estimated_cost > 0.0 {
            parts.push(format!("~{} estimated", fmt_cost(stats.estimated_cost)));
        }
        cprintln!("  cost: {YELLOW}{}{RESET}", parts.join(" · "));
    }
}

fn print_streaks(stats: &YearlyStats) {
    println!();
    if stats.max_streak > 0 {
        let range = match (
            stats.max_streak_days.iter().next(),
            stats.max_streak_days.iter().next_back(),
        ) {
            (Some(first), Some(last)) if first != last => format!(" ({first} → {last})"),
            (Some(first), _) => format!(" ({first})"),
            _ => String::new(),
        };
        cprintln!(
            "  longest streak: {GREEN}{BOLD}{}{RESET} day{}{DIM}{range}{RESET} · current: {GREEN}{}{RESET}",
            stats.max_streak,
            if stats.max_streak != 1 { "s" } else { "" },
            stats.current_streak
        );
    }
    if let Some((day, count)) = &stats.busiest_day {
        let weekday = stats
            .busiest_weekday
            .map(|i| format!(" · busiest weekday: {}", WEEKDAY_NAMES[i]))
            .unwrap_or_default();
        cprintln!(
            "  busiest day: {BOLD}{day}{RESET} ({} messages){weekday}",
            fmt_count(*count)
        );
    }
    if stats.days_since_first_session > 0 {
        cprintln!(
            "  {DIM}first session {} days ago{RESET}",
            stats.days_since_first_session
        );
    }
}

fn print_ranked(label: &str, ranked: &[RankedUsage]) {
    if ranked.is_empty() {
        return;
    }
    println!();
    cprintln!("  {BOLD}{label}{RESET}");
    cprintln!("  {DIM}{}{RESET}", "─".repeat(label.len()));
    for r in ranked {
        cprintln!(
            "  {BOLD}{:>6}×{RESET} {CYAN}{:<28}{RESET} {DIM}{:>3}%{RESET}",
            fmt_count(r.count),
            trunc(&r.display_name, 28),
            r.percent
        );
    }
}
