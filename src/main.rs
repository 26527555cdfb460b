use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{bail, Context, Result};
use dfagrep::{RegexEngine, RegexSource, Utf16Str};

struct Args {
    pattern: String,
    flags: String,
    only_matching: bool,
}

// Usage: echo <input_text> | dfagrep -E <pattern> [-f <flags>] [-o]
fn parse_args() -> Result<Args> {
    let mut pattern = None;
    let mut flags = String::new();
    let mut only_matching = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-E" => pattern = Some(args.next().context("-E expects a pattern")?),
            "-f" => flags = args.next().context("-f expects flags")?,
            "-o" | "--only-matching" => only_matching = true,
            other => bail!("unexpected argument '{other}'"),
        }
    }
    let Some(pattern) = pattern else {
        bail!("Expected first argument to be '-E'");
    };
    Ok(Args {
        pattern,
        flags,
        only_matching,
    })
}

// Prints the matching lines (or matched parts) and reports whether any matched.
fn run(args: &Args) -> Result<bool> {
    let engine = RegexEngine::default();
    let source = match RegexSource::from_parts(&args.pattern, &args.flags) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };
    let regex = match engine.compile(&source) {
        Ok(regex) => regex,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };
    log::debug!("compiled {:?}", regex);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut any = false;
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read standard input")?;
        let text = Utf16Str::new(&line);
        let mut from = 0;
        loop {
            let result = regex.execute(&text, from);
            let Some((start, end)) = result.group(0) else {
                break;
            };
            any = true;
            if !args.only_matching {
                writeln!(out, "{line}")?;
                break;
            }
            if end > start {
                writeln!(out, "{}", text.slice(start, end))?;
            }
            // Step past empty matches so the scan always advances.
            from = if end > start { end } else { end + 1 };
            if from > text.units().len() {
                break;
            }
        }
    }
    out.flush().context("failed to flush standard output")?;
    Ok(any)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;
    if run(&args)? {
        process::exit(0)
    } else {
        process::exit(1)
    }
}
