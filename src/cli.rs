use crate::view::fmt::{ceprintln, cprintln, BOLD, DIM, GREEN, RESET};
use crate::{card, clipboard, corpus, pricing, stats, term_image, view};
use anyhow::{Context, Result};
use chrono::Datelike;
use std::path::PathBuf;

pub async fn run(args: &[String]) -> Result<()> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("recap {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    generate(parse_args(args)?).await
}

struct Options {
    year: i32,
    output: Option<PathBuf>,
    copy: bool,
    text: bool,
    no_inline: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let year = match get_flag(args, "--year") {
        Some(v) => v
            .parse()
            .with_context(|| format!("invalid --year value: {v}"))?,
        None => chrono::Local::now().year(),
    };
    Ok(Options {
        year,
        output: get_flag(args, "--output").map(PathBuf::from),
        copy: args.iter().any(|a| a == "--copy"),
        text: args.iter().any(|a| a == "--text"),
        no_inline: args.iter().any(|a| a == "--no-inline"),
    })
}

fn get_flag(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

async fn generate(opts: Options) -> Result<()> {
    let Some(corpus) = corpus::Corpus::open()? else {
        cprintln!(
            "\n  {DIM}no opencode data found at {}{RESET}\n",
            corpus::default_root().display()
        );
        return Ok(());
    };

    let snapshot = corpus.load()?;
    if snapshot.skipped > 0 {
        ceprintln!(
            "  {DIM}skipped {} unreadable record file{}{RESET}",
            snapshot.skipped,
            if snapshot.skipped != 1 { "s" } else { "" }
        );
    }

    let resolver = pricing::PricingResolver::new();
    let prices = resolver.table().await;

    let stats = stats::compute_yearly_stats(
        opts.year,
        &snapshot.sessions,
        &snapshot.messages,
        &snapshot.projects,
        prices,
    );

    if stats.total_messages == 0 && stats.total_sessions == 0 {
        cprintln!(
            "\n  {DIM}nothing to show for {} — no sessions or messages that year{RESET}\n",
            opts.year
        );
        return Ok(());
    }

    view::print_summary(&stats);

    if opts.text {
        return Ok(());
    }

    let card = card::render(&stats)?;

    let path = opts
        .output
        .unwrap_or_else(|| std::env::temp_dir().join(format!("recap-{}.png", opts.year)));
    std::fs::write(&path, &card.png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    cprintln!("  {GREEN}✓{RESET} card saved to {BOLD}{}{RESET}", path.display());

    if !opts.no_inline && term_image::supports_inline() {
        term_image::print_inline(&card.png);
    }

    if opts.copy {
        match clipboard::copy_image(&card) {
            Ok(()) => cprintln!("  {GREEN}✓{RESET} card copied to clipboard"),
            Err(e) => ceprintln!("  {DIM}clipboard copy failed: {e}{RESET}"),
        }
    }

    println!();
    Ok(())
}

fn print_help() {
    println!("recap {}", env!("CARGO_PKG_VERSION"));
    println!("Your year with opencode — one shareable card, straight from local data.\n");
    println!("USAGE:");
    println!("  recap [OPTIONS]\n");
    println!("OPTIONS:");
    println!("  --year <int>       Year to aggregate (default: current year)");
    println!("  --output <path>    Where to save the card (default: temp dir)");
    println!("  --copy             Copy the card to the clipboard");
    println!("  --text             Terminal summary only, skip the image");
    println!("  --no-inline        Never draw the card inline in the terminal");
    println!("  -h, --help         Show this message");
    println!("  -V, --version      Show version\n");
    println!("ENVIRONMENT:");
    println!("  RECAP_DATA_DIR     Storage root (default: ~/.local/share/opencode/storage)");
    println!("  NO_COLOR           Disable ANSI colors");
}
