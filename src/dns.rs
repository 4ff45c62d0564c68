//! Captive DNS: every A query resolves to the portal address.

use std::net::Ipv4Addr;

pub const DNS_PORT: u16 = 53;
/// Classic UDP DNS message limit.
pub const MAX_MESSAGE_LEN: usize = 512;
pub const ANSWER_TTL: u32 = 60;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    /// End of the question section in the query.
    end: usize,
}

/// Parses a standard query with exactly one question.
pub fn parse_query(packet: &[u8]) -> Option<Question> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([packet[2], packet[3]]);
    let opcode = (flags >> 11) & 0x0f;
    let qdcount = u16::from_be_bytes([packet[4], packet[5]]);
    if flags & FLAG_QR != 0 || opcode != 0 || qdcount != 1 {
        return None;
    }

    let mut pos = HEADER_LEN;
    let mut name = String::new();
    loop {
        let len = *packet.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        // compression pointers never appear in a lone question
        if len & 0xc0 != 0 || name.len() + len > 253 {
            return None;
        }
        let label = packet.get(pos..pos + len)?;
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(label));
        pos += len;
    }

    let fixed = packet.get(pos..pos + 4)?;
    Some(Question {
        name,
        qtype: u16::from_be_bytes([fixed[0], fixed[1]]),
        qclass: u16::from_be_bytes([fixed[2], fixed[3]]),
        end: pos + 4,
    })
}

/// Writes the answer for `query` into `out`. `None` means the packet should
/// be ignored.
pub fn build_response(
    query: &[u8],
    addr: Ipv4Addr,
    out: &mut [u8; MAX_MESSAGE_LEN],
) -> Option<usize> {
    let question = parse_query(query)?;
    let answer = question.qclass == CLASS_IN && matches!(question.qtype, TYPE_A | TYPE_ANY);

    let query_flags = u16::from_be_bytes([query[2], query[3]]);
    let flags = FLAG_QR | FLAG_AA | FLAG_RA | (query_flags & FLAG_RD);

    let qlen = question.end - HEADER_LEN;
    let total = question.end + if answer { 16 } else { 0 };
    if total > MAX_MESSAGE_LEN {
        return None;
    }

    out[0..2].copy_from_slice(&query[0..2]);
    out[2..4].copy_from_slice(&flags.to_be_bytes());
    out[4..6].copy_from_slice(&1u16.to_be_bytes());
    out[6..8].copy_from_slice(&(answer as u16).to_be_bytes());
    out[8..12].fill(0);
    out[HEADER_LEN..question.end].copy_from_slice(&query[HEADER_LEN..HEADER_LEN + qlen]);

    if answer {
        let a = &mut out[question.end..total];
        a[0..2].copy_from_slice(&[0xc0, HEADER_LEN as u8]);
        a[2..4].copy_from_slice(&TYPE_A.to_be_bytes());
        a[4..6].copy_from_slice(&CLASS_IN.to_be_bytes());
        a[6..10].copy_from_slice(&ANSWER_TTL.to_be_bytes());
        a[10..12].copy_from_slice(&4u16.to_be_bytes());
        a[12..16].copy_from_slice(&addr.octets());
    }

    if answer {
        log::debug!("dns {} type {} -> {}", question.name, question.qtype, addr);
    } else {
        log::debug!("dns {} type {} -> -", question.name, question.qtype);
    }
    Some(total)
}
