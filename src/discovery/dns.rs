//! Just enough of the DNS wire format to answer address queries for one host.

use std::net::Ipv4Addr;

pub const TYPE_A: u16 = 1;
pub const TYPE_ANY: u16 = 255;
pub const CLASS_IN: u16 = 1;
const CLASS_ANY: u16 = 255;
/// IN with the cache-flush bit, used for records this host owns
const CLASS_IN_FLUSH: u16 = 0x8001;
/// Authoritative answer, response bit set
const FLAGS_RESPONSE: u16 = 0x8400;
const HEADER_LEN: usize = 12;
const MAX_POINTER_JUMPS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn asks_for(&self, host: &str) -> bool {
        let qtype_matches = self.qtype == TYPE_A || self.qtype == TYPE_ANY;
        // top bit is the unicast-response flag
        let class = self.qclass & 0x7fff;
        let class_matches = class == CLASS_IN || class == CLASS_ANY;
        qtype_matches && class_matches && self.name.eq_ignore_ascii_case(host)
    }
}

/// Encode a dotted name as length-prefixed labels
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    for label in name.trim_end_matches('.').split('.') {
        if label.is_empty() {
            continue;
        }
        let bytes = &label.as_bytes()[..label.len().min(63)];
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    out
}

/// A single-record response mapping `host` to `ip`
///
/// `ttl` 0 turns the packet into a goodbye that tells caches to drop the record.
pub fn build_response(id: u16, host: &str, ip: Ipv4Addr, ttl: u32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + host.len() + 16);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&FLAGS_RESPONSE.to_be_bytes());
    packet.extend_from_slice(&0u16.to_be_bytes()); // questions
    packet.extend_from_slice(&1u16.to_be_bytes()); // answers
    packet.extend_from_slice(&0u16.to_be_bytes()); // authority
    packet.extend_from_slice(&0u16.to_be_bytes()); // additional

    packet.extend_from_slice(&encode_name(host));
    packet.extend_from_slice(&TYPE_A.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN_FLUSH.to_be_bytes());
    packet.extend_from_slice(&ttl.to_be_bytes());
    packet.extend_from_slice(&4u16.to_be_bytes());
    packet.extend_from_slice(&ip.octets());
    packet
}

/// Transaction id of a query packet
pub fn query_id(packet: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes([*packet.first()?, *packet.get(1)?]))
}

/// Questions carried by a query; responses and malformed packets yield `None`
pub fn parse_questions(packet: &[u8]) -> Option<Vec<Question>> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([packet[2], packet[3]]);
    if flags & 0x8000 != 0 {
        return None;
    }
    let count = u16::from_be_bytes([packet[4], packet[5]]);

    // a question takes at least five bytes, so the header count cannot be trusted
    let room = (packet.len() - HEADER_LEN) / 5;
    let mut questions = Vec::with_capacity((count as usize).min(room));
    let mut offset = HEADER_LEN;
    for _ in 0..count {
        let (name, next) = read_name(packet, offset)?;
        let fields = packet.get(next..next + 4)?;
        questions.push(Question {
            name,
            qtype: u16::from_be_bytes([fields[0], fields[1]]),
            qclass: u16::from_be_bytes([fields[2], fields[3]]),
        });
        offset = next + 4;
    }
    Some(questions)
}

/// Read a possibly compressed name, returning it and the offset after it
fn read_name(packet: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut offset = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *packet.get(offset)? as usize;
        match len {
            0 => {
                let end = end.unwrap_or(offset + 1);
                return Some((labels.join("."), end));
            }
            l if l & 0xc0 == 0xc0 => {
                let low = *packet.get(offset + 1)? as usize;
                if end.is_none() {
                    end = Some(offset + 2);
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                offset = ((l & 0x3f) << 8) | low;
            }
            l if l <= 63 => {
                let label = packet.get(offset + 1..offset + 1 + l)?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                offset += 1 + l;
            }
            _ => return None,
        }
    }
}
