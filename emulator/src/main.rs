mod grammar;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use gpadc_core::VariantDescriptor;
use gpadc_core::variant;

use session::Session;

struct Options {
    variant: &'static VariantDescriptor,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: gpadc-emulator [--variant <{}>] [--transcript <path>]",
            variant_names()
        );
        process::exit(2);
    });

    let mut session = Session::new(options.variant, options.transcript.as_deref())?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut session, stdin.lock(), stdout.lock())
}

/// Drives `session` from `input` until end of input or `exit`/`quit`.
fn run<R: BufRead, W: Write>(session: &mut Session, input: R, mut output: W) -> io::Result<()> {
    writeln!(output, "{}", session.banner())?;
    prompt(&mut output)?;

    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        if is_exit(command) {
            return writeln!(output, "bye");
        }
        if !command.is_empty() {
            for response in session.handle_command(command)? {
                writeln!(output, "{response}")?;
            }
        }
        prompt(&mut output)?;
    }

    writeln!(output)
}

fn prompt<W: Write>(output: &mut W) -> io::Result<()> {
    write!(output, "gpadc> ")?;
    output.flush()
}

fn is_exit(command: &str) -> bool {
    ["exit", "quit"]
        .iter()
        .any(|word| command.eq_ignore_ascii_case(word))
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        variant: &variant::SUN4I_A10,
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--variant=") {
            options.variant = resolve_variant(value)?;
        } else if arg == "--variant" {
            let value = args.next().ok_or("Expected value after --variant")?;
            options.variant = resolve_variant(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected value after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            options.variant = resolve_variant(&arg)?;
        }
    }

    Ok(options)
}

/// Accepts a short name (`sun8i-h3`) or a full compatible string.
fn resolve_variant(tag: &str) -> Result<&'static VariantDescriptor, String> {
    variant::by_name(tag)
        .or_else(|| variant::lookup(tag))
        .ok_or_else(|| format!("Unknown variant `{tag}`"))
}

fn variant_names() -> String {
    variant::VARIANTS
        .iter()
        .map(|variant| variant.name)
        .collect::<Vec<_>>()
        .join("|")
}
