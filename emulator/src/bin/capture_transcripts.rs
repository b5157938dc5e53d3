use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../grammar.rs"]
mod grammar;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use gpadc_core::VariantDescriptor;
use gpadc_core::variant::{SUN4I_A10, SUN8I_A33, SUN8I_H3};

use session::Session;

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record(&SUN4I_A10, record_touchscreen)?;
    record(&SUN8I_H3, record_thermal)?;
    record(&SUN8I_A33, record_faults)?;
    Ok(())
}

fn record(
    variant: &'static VariantDescriptor,
    script: fn(&mut Session) -> io::Result<()>,
) -> io::Result<()> {
    let path = PathBuf::from(TRANSCRIPT_DIR).join(format!("emulator-{}.log", variant.name));
    let mut session = Session::new(variant, Some(&path))?;
    script(&mut session)
}

fn record_touchscreen(session: &mut Session) -> io::Result<()> {
    session.handle_command("channels")?;
    session.handle_command("scale")?;
    for channel in 0..4 {
        session.handle_command(&format!("adc {channel}"))?;
    }
    session.handle_command("temp")?;
    session.handle_command("irq off")?;
    session.handle_command("adc 2")?;
    session.handle_command("irq on")?;
    session.handle_command("adc 2")?;
    std::thread::sleep(std::time::Duration::from_millis(700));
    session.handle_command("status")?;
    session.handle_command("events 12")?;
    Ok(())
}

fn record_thermal(session: &mut Session) -> io::Result<()> {
    session.handle_command("temp")?;
    session.handle_command("poke 0x80 1500")?;
    session.handle_command("temp")?;
    session.handle_command("adc 0")?;
    std::thread::sleep(std::time::Duration::from_millis(600));
    session.handle_command("status")?;
    session.handle_command("suspend")?;
    session.handle_command("temp")?;
    session.handle_command("events")?;
    Ok(())
}

fn record_faults(session: &mut Session) -> io::Result<()> {
    session.handle_command("help fault")?;
    session.handle_command("fault read 0x20")?;
    session.handle_command("temp")?;
    session.handle_command("fault clear")?;
    session.handle_command("temp 1")?;
    session.handle_command("temp")?;
    session.handle_command("fault write 0x18")?;
    session.handle_command("suspend")?;
    session.handle_command("resume")?;
    session.handle_command("status")?;
    Ok(())
}
