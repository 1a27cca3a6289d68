//! Basic usage example for the RTM wire envelopes.

use rtm_wire::{decode_inbound, FrameKind, OutboundFrame};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== RTM Wire Example ===\n");

    // 1. Build and seal an outbound message frame
    println!("1. Sealing a MESSAGE frame...");
    let sealed = OutboundFrame::new(FrameKind::Message)
        .with("channel", "C024BE91L")
        .with("text", "Hello, channel!")
        .seal(1);
    let text = sealed.encode()?;
    println!("   Encoded: {}", text);

    // 2. Decode an inbound event
    println!("\n2. Decoding an inbound event...");
    let msg = decode_inbound(
        r#"{"type":"message","user":"U2147483697","channel":"C024BE91L","text":"hi","ts":"1355517523.000005"}"#,
    )?;
    println!("   Kind: {:?}", msg.kind());
    println!("   From: {:?} in {:?}", msg.str_field("user"), msg.str_field("channel"));

    // 3. Untyped frames still decode
    println!("\n3. Decoding a reply without a type...");
    let reply = decode_inbound(r#"{"ok":true,"reply_to":1,"ts":"1355517523.000005"}"#)?;
    println!("   Type: {:?}, reply_to: {:?}", reply.message_type(), reply.get("reply_to"));

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
