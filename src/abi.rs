//! Minimal contract ABI encoding for the governance calls
//!
//! Only the shapes the governance contract actually uses: uint256, bool,
//! address, string, and uint256[] returns. Head/tail layout per the standard
//! 32-byte-slot encoding; dynamic values (strings, arrays) get an offset in
//! the head and length-prefixed data in the tail.

use crate::errors::ClientError;

// 4-byte function selectors (keccak-256 of the canonical signature)
pub const SEL_CREATE_PROPOSAL: u32 = 0x0ce0_ebf4; // createProposal(string,string,uint256)
pub const SEL_VOTE: u32 = 0xc9d2_7afe; // vote(uint256,bool)
pub const SEL_EXECUTE_PROPOSAL: u32 = 0x0d61_b519; // executeProposal(uint256)
pub const SEL_HAS_VOTED: u32 = 0x4385_9632; // hasVoted(uint256,address)
pub const SEL_GET_PROPOSAL: u32 = 0xc7f7_58a8; // getProposal(uint256)
pub const SEL_GET_PROPOSALS: u32 = 0x6256_4c48; // getProposals()
pub const SEL_BALANCE_OF: u32 = 0x70a0_8231; // balanceOf(address)

const WORD_HEX: usize = 64;

/// One encodable argument
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Uint(u128),
    Bool(bool),
    Address(String),
    Str(String),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Str(_))
    }

    fn encode_static(&self) -> String {
        match self {
            Token::Uint(v) => encode_u256(*v),
            Token::Bool(b) => encode_u256(if *b { 1 } else { 0 }),
            Token::Address(a) => encode_address(a),
            Token::Str(_) => unreachable!("dynamic token has no static encoding"),
        }
    }

    fn encode_tail(&self) -> String {
        match self {
            Token::Str(s) => encode_bytes(s.as_bytes()),
            _ => String::new(),
        }
    }
}

/// Build `0x<selector><encoded args>` calldata
pub fn encode_call(selector: u32, tokens: &[Token]) -> String {
    let head_bytes = tokens.len() * 32;
    let mut head = String::new();
    let mut tail = String::new();

    for token in tokens {
        if token.is_dynamic() {
            let offset = head_bytes + tail.len() / 2;
            head.push_str(&encode_u256(offset as u128));
            tail.push_str(&token.encode_tail());
        } else {
            head.push_str(&token.encode_static());
        }
    }

    format!("0x{:08x}{}{}", selector, head, tail)
}

/// A u128 value left-padded into one 32-byte word
pub fn encode_u256(value: u128) -> String {
    format!("{:0>64x}", value)
}

/// A 20-byte address left-padded into one word
pub fn encode_address(address: &str) -> String {
    let hex = address.trim_start_matches("0x").to_lowercase();
    format!("{:0>64}", hex)
}

/// Length word followed by right-padded data words
pub fn encode_bytes(data: &[u8]) -> String {
    let mut out = encode_u256(data.len() as u128);
    for byte in data {
        out.push_str(&format!("{:02x}", byte));
    }
    // Pad the last word to a 32-byte boundary
    while out.len() % WORD_HEX != 0 {
        out.push('0');
    }
    out
}

fn strip(data: &str) -> &str {
    data.trim_start_matches("0x")
}

/// The i-th 32-byte word of return data
fn word(data: &str, index: usize) -> Result<&str, ClientError> {
    let data = strip(data);
    let start = index * WORD_HEX;
    let end = start + WORD_HEX;
    data.get(start..end).ok_or_else(|| {
        ClientError::DataShape(format!(
            "return data too short: wanted word {} of {} hex chars",
            index,
            data.len()
        ))
    })
}

/// Decode the word at `slot` as an unsigned integer
///
/// Values above u128::MAX do not occur for proposal ids, vote tallies, or
/// token balances in this demo, so the upper 16 bytes are required to be zero.
pub fn decode_uint(data: &str, slot: usize) -> Result<u128, ClientError> {
    let w = word(data, slot)?;
    let (high, low) = w.split_at(32);
    if high.chars().any(|c| c != '0') {
        return Err(ClientError::DataShape(format!(
            "uint at slot {} exceeds 128 bits",
            slot
        )));
    }
    u128::from_str_radix(low, 16)
        .map_err(|e| ClientError::DataShape(format!("bad uint at slot {}: {}", slot, e)))
}

pub fn decode_bool(data: &str, slot: usize) -> Result<bool, ClientError> {
    Ok(decode_uint(data, slot)? != 0)
}

/// Decode the word at `slot` as an address (`0x` + 40 hex chars)
pub fn decode_address(data: &str, slot: usize) -> Result<String, ClientError> {
    let w = word(data, slot)?;
    Ok(format!("0x{}", &w[24..]))
}

/// Decode a dynamic string whose offset sits at `slot`
pub fn decode_string(data: &str, slot: usize) -> Result<String, ClientError> {
    let offset = decode_uint(data, slot)? as usize;
    if offset % 32 != 0 {
        return Err(ClientError::DataShape(format!(
            "misaligned string offset {}",
            offset
        )));
    }
    let len_slot = offset / 32;
    let len = decode_uint(data, len_slot)? as usize;

    let data = strip(data);
    let start = (len_slot + 1) * WORD_HEX;
    let end = start + len * 2;
    let hex = data.get(start..end).ok_or_else(|| {
        ClientError::DataShape(format!("string data truncated: wanted {} bytes", len))
    })?;

    let mut bytes = Vec::with_capacity(len);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|e| ClientError::DataShape(format!("bad string byte: {}", e)))?;
        bytes.push(byte);
    }
    // Contract strings are expected UTF-8; replace rather than fail on junk
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a dynamic uint256[] whose offset sits at `slot`
pub fn decode_uint_array(data: &str, slot: usize) -> Result<Vec<u128>, ClientError> {
    let offset = decode_uint(data, slot)? as usize;
    if offset % 32 != 0 {
        return Err(ClientError::DataShape(format!(
            "misaligned array offset {}",
            offset
        )));
    }
    let len_slot = offset / 32;
    let len = decode_uint(data, len_slot)? as usize;

    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        items.push(decode_uint(data, len_slot + 1 + i)?);
    }
    Ok(items)
}
