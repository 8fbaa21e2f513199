//! Query a few values from an MKS 647C connected over a serial port.

use mks647c::{message::ChannelMessage, port::Port, response::ResponseKind};
use simple_logger::SimpleLogger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    let port_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let channel = 3;

    // Open the port and throw away anything left over from a previous session.
    let mut port = Port::open_serial(&port_path)?;
    port.clear()?;

    // The gas menu is read without the `R` marker.
    let mut gas_menu = ChannelMessage::query("GM").with_channel(0);
    gas_menu.set_optional_query(false);
    let reply = port.query(&gas_menu)?;
    println!("gas menu: {:?}", reply.value_1());

    // Read the flow setpoint, change it, and read it back.
    let setpoint = ChannelMessage::query("FS")
        .with_channel(channel)
        .with_response_kind(ResponseKind::Integer);
    let before = port.query(&setpoint)?;
    port.write(&ChannelMessage::write("FS", 500.0).with_channel(channel))?;
    let after = port.query(&setpoint)?;
    println!(
        "setpoint on channel {channel}: {:?} -> {:?}",
        before.value_1().as_int(),
        after.value_1().as_int()
    );

    // Device errors are reported separately from protocol errors.
    match port.query(&ChannelMessage::query("FS").with_channel(9)) {
        Ok(reply) => println!("channel 9: {:?}", reply.value_1()),
        Err(e) if e.is_device_error() => println!("channel 9 is refused: {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
