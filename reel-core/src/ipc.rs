use crate::{
    env::{Action, EnvironmentDescription, Transition},
    frame::Frame,
};
use bincode::{Decode, Encode};
use std::io::{Read, Write};
use thiserror::Error;

/// Largest packet accepted on the wire.
pub const MAX_PACKET_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("socket i/o failed")]
    Io(#[from] std::io::Error),
    #[error("failed to encode packet")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode packet")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("packet of {0} bytes exceeds the {MAX_PACKET_LEN} byte limit")]
    TooLarge(usize),
    #[error("simulator reported: {0}")]
    Remote(String),
    #[error("expected a {expected} packet")]
    Unexpected { expected: &'static str },
}

/// Sent from the recording process to the simulator.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Request {
    Describe,
    Reset,
    Step { action: Action },
    Close,
}

/// Sent from the simulator back to the recording process.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Response {
    Description(EnvironmentDescription),
    Observation(Frame),
    Transition(Transition),
    Closed,
    Failed { message: String },
}

// Packets are a big-endian u32 length followed by the bincode payload.
pub fn send_packet<W: Write, P: Encode>(conn: &mut W, packet: &P) -> Result<(), IpcError> {
    let payload = bincode::encode_to_vec(packet, bincode::config::standard())?;
    if payload.len() > MAX_PACKET_LEN {
        return Err(IpcError::TooLarge(payload.len()));
    }
    let payload_len = (payload.len() as u32).to_be_bytes();
    conn.write_all(&payload_len)?;
    conn.write_all(&payload)?;
    conn.flush()?;
    Ok(())
}

pub fn receive_packet<R: Read, P: Decode<()>>(conn: &mut R) -> Result<P, IpcError> {
    let mut content_len = [0u8; 4];
    conn.read_exact(&mut content_len)?;
    let len = u32::from_be_bytes(content_len) as usize;
    if len > MAX_PACKET_LEN {
        return Err(IpcError::TooLarge(len));
    }
    let mut buffer = vec![0u8; len];
    conn.read_exact(&mut buffer)?;
    let (packet, _) = bincode::decode_from_slice(&buffer, bincode::config::standard())?;
    Ok(packet)
}
