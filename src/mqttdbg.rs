//! A purely observational MQTT 3.1.1 fixed-header/payload decoder, used only
//! to print human-readable diagnostics for packets crossing the bridge. Must
//! never influence packet delivery.

use std::fmt::Write as _;

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const SUBSCRIBE: u8 = 8;
const PINGREQ: u8 = 12;

const TYPE_NAMES: [&str; 15] = [
    "RESERVED", "CONNECT", "CONNACK", "PUBLISH", "PUBACK", "PUBREC", "PUBREL", "PUBCOMP",
    "SUBSCRIBE", "SUBACK", "UNSUBSCRIBE", "UNSUBACK", "PINGREQ", "PINGRESP", "DISCONNECT",
];

fn type_name(message_type: u8) -> &'static str {
    TYPE_NAMES.get(message_type as usize).copied().unwrap_or("Unknown")
}

/// Decodes the variable-length "remaining length" field, returning the
/// decoded value and the position immediately after it.
fn decode_remaining_length(buf: &[u8], mut pos: usize) -> Option<(usize, usize)> {
    let mut multiplier: usize = 1;
    let mut value: usize = 0;
    loop {
        let byte = *buf.get(pos)?;
        pos += 1;
        value += ((byte & 0x7F) as usize) * multiplier;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
        if multiplier > 128 * 128 * 128 {
            return None;
        }
    }
    Some((value, pos))
}

fn read_string(buf: &[u8], pos: usize) -> Option<(String, usize)> {
    let (len, pos) = read_uint16(buf, pos)?;
    let end = pos + len as usize;
    let s = std::str::from_utf8(buf.get(pos..end)?).ok()?.to_owned();
    Some((s, end))
}

fn read_uint16(buf: &[u8], pos: usize) -> Option<(u16, usize)> {
    let bytes = buf.get(pos..pos + 2)?;
    Some((u16::from_be_bytes([bytes[0], bytes[1]]), pos + 2))
}

/// Formats an MQTT control packet for logging. Returns `None` if the buffer
/// is too short or malformed to parse the fixed header.
pub fn describe(buf: &[u8]) -> Option<String> {
    let first_byte = *buf.first()?;
    let message_type = first_byte >> 4;
    let flags = first_byte & 0x0F;
    let (remaining_length, mut pos) = decode_remaining_length(buf, 1)?;

    let mut out = String::new();
    let _ = writeln!(out, "Message Type: {}", type_name(message_type));

    match message_type {
        CONNECT => {
            let (protocol_name, p) = read_string(buf, pos)?;
            pos = p;
            let protocol_level = *buf.get(pos)?;
            pos += 1;
            let connect_flags = *buf.get(pos)?;
            pos += 1;
            let (keep_alive, p) = read_uint16(buf, pos)?;
            pos = p;
            let (client_id, p) = read_string(buf, pos)?;
            pos = p;

            let mut will_topic = None;
            let mut will_message = None;
            if connect_flags & 0x04 != 0 {
                let (topic, p) = read_string(buf, pos)?;
                let (message, p2) = read_string(buf, p)?;
                will_topic = Some(topic);
                will_message = Some(message);
                pos = p2;
            }
            let mut username = None;
            if connect_flags & 0x80 != 0 {
                let (u, p) = read_string(buf, pos)?;
                username = Some(u);
                pos = p;
            }
            let mut password = None;
            if connect_flags & 0x40 != 0 {
                let (pw, p) = read_string(buf, pos)?;
                password = Some(pw);
                pos = p;
            }

            let _ = writeln!(out, "Protocol Name: {protocol_name}");
            let _ = writeln!(out, "Protocol Level: {protocol_level}");
            let _ = writeln!(out, "Connect Flags: {connect_flags:#010b}");
            let _ = writeln!(out, "Keep Alive: {keep_alive}");
            let _ = writeln!(out, "Client ID: {client_id}");
            if let (Some(topic), Some(message)) = (&will_topic, &will_message) {
                let _ = writeln!(out, "Will Topic: {topic}");
                let _ = writeln!(out, "Will Message: {message}");
            }
            if let Some(username) = &username {
                let _ = writeln!(out, "Username: {username}");
            }
            if let Some(password) = &password {
                let _ = writeln!(out, "Password: {password}");
            }
        }
        PUBLISH => {
            let dup = (flags & 0x08) >> 3;
            let qos = (flags & 0x06) >> 1;
            let retain = flags & 0x01;

            let (topic_name, p) = read_string(buf, pos)?;
            pos = p;
            let mut packet_id = None;
            if qos > 0 {
                let (id, p) = read_uint16(buf, pos)?;
                packet_id = Some(id);
                pos = p;
            }
            let payload = buf.get(pos..)?;

            let _ = writeln!(out, "DUP: {dup}");
            let _ = writeln!(out, "QoS: {qos}");
            let _ = writeln!(out, "RETAIN: {retain}");
            let _ = writeln!(out, "Topic Name: {topic_name}");
            if let Some(packet_id) = packet_id {
                let _ = writeln!(out, "Packet Identifier: {packet_id}");
            }
            let _ = writeln!(out, "PayloadB: [{}] {}", payload.len(), hex(payload));
            let _ = writeln!(out, "PayloadS: {}", String::from_utf8_lossy(payload));
        }
        SUBSCRIBE => {
            let (packet_id, p) = read_uint16(buf, pos)?;
            pos = p;
            let _ = writeln!(out, "Packet Identifier: {packet_id}");
            let _ = writeln!(out, "Subscriptions:");
            while pos < buf.len() {
                let (topic, p) = read_string(buf, pos)?;
                let qos = buf.get(p)? & 0x03;
                pos = p + 1;
                let _ = writeln!(out, "  Topic: {topic}, Requested QoS: {qos}");
            }
        }
        PINGREQ => {
            if remaining_length != 0 {
                let _ = writeln!(out, "Invalid PINGREQ. Remaining length should be 0.");
            }
        }
        _ => {}
    }

    Some(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
