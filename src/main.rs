use std::io::{self, Read, Write};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use backtrack_regex::{Regex, RegexOptions};

/// Match, replace or split lines of stdin with a backtracking regex.
#[derive(Parser)]
#[command(name = "bgrep", version, about)]
struct Cli {
    /// Pattern to match.
    #[arg(short = 'E', long = "regexp", value_name = "PATTERN")]
    pattern: String,

    /// Case-insensitive matching.
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// `^` and `$` match at line breaks; the whole input is one subject.
    #[arg(short = 'm', long)]
    multiline: bool,

    /// `.` matches line breaks; the whole input is one subject.
    #[arg(short = 's', long)]
    singleline: bool,

    /// Fold case with the full Unicode lowercase mapping.
    #[arg(long)]
    culture: bool,

    /// Print each subject with every match replaced by TEMPLATE ($1, $&, $$).
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "split")]
    replace: Option<String>,

    /// Print the pieces between matches, one per line.
    #[arg(long)]
    split: bool,
}

impl Cli {
    fn options(&self) -> RegexOptions {
        let mut options = RegexOptions::empty();
        options.set(RegexOptions::IGNORE_CASE, self.ignore_case);
        options.set(RegexOptions::MULTILINE, self.multiline);
        options.set(RegexOptions::SINGLELINE, self.singleline);
        options.set(RegexOptions::CULTURE_SENSITIVE, self.culture);
        options
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let regex = Regex::with_options(&cli.pattern, cli.options())
        .with_context(|| format!("invalid pattern {:?}", cli.pattern))?;
    log::debug!("pattern {:?} compiled to {}", cli.pattern, regex);

    let mut input = String::new();
    io::stdin().read_to_string(&mut input).context("reading stdin")?;

    let subjects: Vec<&str> = if cli.multiline || cli.singleline {
        vec![input.strip_suffix('\n').unwrap_or(&input)]
    } else {
        input.lines().collect()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut matched = false;
    for subject in subjects {
        if let Some(template) = &cli.replace {
            matched |= regex.is_match(subject);
            writeln!(out, "{}", regex.replace(subject, template))?;
        } else if cli.split {
            matched |= regex.is_match(subject);
            for piece in regex.split(subject) {
                writeln!(out, "{piece}")?;
            }
        } else if regex.is_match(subject) {
            matched = true;
            writeln!(out, "{subject}")?;
        }
    }
    Ok(matched)
}

// Usage: echo <input_text> | bgrep -E <pattern>
fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}
