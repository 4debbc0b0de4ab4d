//! Length-prefixed framing of messages.
//!
//! A frame is a big-endian `u32` body length followed by the `bincode`
//! encoding of a message.
use simbridge_core::BridgeError;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};

/// Largest accepted frame body, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Writes a message as one frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), BridgeError> {
    let body = bincode::serialize(msg).map_err(|e| BridgeError::Protocol(e.to_string()))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(BridgeError::Protocol(format!(
            "frame of {} bytes exceeds the limit",
            body.len()
        )));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame and decodes its message.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, BridgeError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(BridgeError::Protocol(format!(
            "frame of {} bytes exceeds the limit",
            len
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    bincode::deserialize(&body).map_err(|e| BridgeError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ManagerMessage;
    use std::io::Cursor;

    #[test]
    fn frames_are_length_prefixed() {
        let mut buf = vec![];
        write_frame(&mut buf, &ManagerMessage::Step).unwrap();
        write_frame(&mut buf, &ManagerMessage::Exit).unwrap();
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len(), 2 * (4 + len));

        let mut rdr = Cursor::new(buf);
        let msg: ManagerMessage = read_frame(&mut rdr).unwrap();
        assert!(matches!(msg, ManagerMessage::Step));
        let msg: ManagerMessage = read_frame(&mut rdr).unwrap();
        assert!(matches!(msg, ManagerMessage::Exit));
        assert!(matches!(
            read_frame::<_, ManagerMessage>(&mut rdr),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut rdr = Cursor::new(u32::MAX.to_be_bytes().to_vec());
        assert!(matches!(
            read_frame::<_, ManagerMessage>(&mut rdr),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(&[0xff, 0xff, 0xff]);
        assert!(matches!(
            read_frame::<_, ManagerMessage>(&mut Cursor::new(buf)),
            Err(BridgeError::Protocol(_))
        ));
    }
}
