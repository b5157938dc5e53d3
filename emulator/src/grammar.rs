//! Command grammar for the emulator REPL.
//!
//! Every command is a keyword followed by whitespace-separated arguments.
//! Keywords and enumerated arguments are case-insensitive; register offsets
//! and values accept decimal or `0x`-prefixed hexadecimal.

use core::fmt;

use winnow::ascii::{Caseless, dec_uint, hex_uint, space0, space1};
use winnow::combinator::{alt, cut_err, delimited, fail, opt, preceded};
use winnow::error::{ContextError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Temp { sensor: u8 },
    Adc { channel: u8 },
    Scale,
    Channels,
    Status,
    Events { count: Option<usize> },
    Suspend,
    Resume,
    /// `irq on|off` unmutes or mutes the simulated interrupt source.
    Irq { enabled: bool },
    Poke { offset: u32, value: u32 },
    Fault(FaultCommand),
    Help { topic: Option<&'a str> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultCommand {
    Read(u32),
    Write(u32),
    Clear,
}

/// Parse failure with the byte offset where it was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at={} {}", self.offset, self.message)
    }
}

/// Parses one REPL line.
pub fn parse(line: &str) -> Result<Command<'_>, SyntaxError> {
    delimited(space0, command, space0)
        .parse(line)
        .map_err(|err| {
            let message = err.inner().to_string();
            SyntaxError {
                offset: err.offset(),
                message: if message.is_empty() {
                    "unexpected input".to_string()
                } else {
                    message.replace('\n', "; ")
                },
            }
        })
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    let keyword = take_while(1.., |c: char| c.is_ascii_alphabetic())
        .context(StrContext::Label("command"))
        .parse_next(input)?;

    match keyword.to_ascii_lowercase().as_str() {
        "temp" => opt(argument(index, "sensor index"))
            .map(|sensor| Command::Temp {
                sensor: sensor.unwrap_or(0),
            })
            .parse_next(input),
        "adc" => argument(index, "channel index")
            .map(|channel| Command::Adc { channel })
            .parse_next(input),
        "scale" => Ok(Command::Scale),
        "channels" => Ok(Command::Channels),
        "status" => Ok(Command::Status),
        "events" => opt(argument(dec_uint, "event count"))
            .map(|count| Command::Events { count })
            .parse_next(input),
        "suspend" => Ok(Command::Suspend),
        "resume" => Ok(Command::Resume),
        "irq" => argument(switch, "on or off")
            .map(|enabled| Command::Irq { enabled })
            .parse_next(input),
        "poke" => (argument(number, "register offset"), argument(number, "value"))
            .map(|(offset, value)| Command::Poke { offset, value })
            .parse_next(input),
        "fault" => argument(fault, "read, write, or clear")
            .map(Command::Fault)
            .parse_next(input),
        "help" => opt(preceded(space1, word))
            .map(|topic| Command::Help { topic })
            .parse_next(input),
        _ => fail::<_, Command<'a>, _>
            .context(StrContext::Label("command"))
            .context(StrContext::Expected(StrContextValue::Description(
                "a command; try `help`",
            )))
            .parse_next(input),
    }
}

/// Whitespace, then `parser`; failures past the separator are fatal.
fn argument<'a, O, P>(
    parser: P,
    expected: &'static str,
) -> impl Parser<&'a str, O, winnow::error::ErrMode<ContextError>>
where
    P: Parser<&'a str, O, winnow::error::ErrMode<ContextError>>,
{
    preceded(
        space1,
        cut_err(parser.context(StrContext::Expected(StrContextValue::Description(
            expected,
        )))),
    )
}

fn index(input: &mut &str) -> ModalResult<u8> {
    dec_uint.parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<u32> {
    alt((preceded(Caseless("0x"), hex_uint), dec_uint)).parse_next(input)
}

fn switch(input: &mut &str) -> ModalResult<bool> {
    alt((Caseless("on").value(true), Caseless("off").value(false))).parse_next(input)
}

fn fault(input: &mut &str) -> ModalResult<FaultCommand> {
    alt((
        preceded((Caseless("read"), space1), number).map(FaultCommand::Read),
        preceded((Caseless("write"), space1), number).map(FaultCommand::Write),
        Caseless("clear").value(FaultCommand::Clear),
    ))
    .parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}
