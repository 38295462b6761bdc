// Control channel wire format
//
// Every control and acknowledgement datagram shares one flat layout:
// [payload_len: u8, id: u32 LE, command: u8, payload...]
// payload_len counts every byte after itself, so a datagram is valid only when
// its transport length equals payload_len + 1. There is no checksum.

use crate::motor::MotorSpeeds;

/// Length byte + message id + command code
pub const HEADER_LEN: usize = 6;

/// Largest datagram the length byte can describe
pub const MAX_MESSAGE_LEN: usize = u8::MAX as usize + 1;

/// Single-byte ASCII command codes
pub mod code {
    pub const SPEED_UP: u8 = b'+';
    pub const SPEED_DOWN: u8 = b'-';
    pub const TURN_LEFT: u8 = b'l';
    pub const TURN_RIGHT: u8 = b'r';
    pub const STOP: u8 = b's';
    pub const SET: u8 = b't';
    pub const DEADZONE: u8 = b'z';
    pub const FLASH: u8 = b'f';
    pub const ACK: u8 = b'a';
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Declared length {declared} does not match datagram length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Datagram of {len} bytes is shorter than the message header")]
    Truncated { len: usize },

    #[error("Command 0x{code:02X} needs {expected} payload bytes, got {actual}")]
    PayloadTooShort {
        code: u8,
        expected: usize,
        actual: usize,
    },
}

/// A decoded datagram, borrowing its payload from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub id: u32,
    pub code: u8,
    pub payload: &'a [u8],
}

/// Validate framing and split a datagram into header fields and payload.
///
/// The length byte is authoritative: any disagreement with the datagram size
/// rejects the whole message.
pub fn decode(datagram: &[u8]) -> Result<Message<'_>, ProtocolError> {
    let Some(&declared) = datagram.first() else {
        return Err(ProtocolError::Truncated { len: 0 });
    };

    let declared = declared as usize;
    if declared + 1 != datagram.len() {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: datagram.len(),
        });
    }

    if datagram.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            len: datagram.len(),
        });
    }

    Ok(Message {
        id: read_u32_le(datagram, 1),
        code: datagram[5],
        payload: &datagram[HEADER_LEN..],
    })
}

impl Message<'_> {
    pub fn command(&self) -> Result<Command, ProtocolError> {
        Command::parse(self.code, self.payload)
    }
}

/// Commands understood by the control service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SpeedUp(u8),
    SpeedDown(u8),
    TurnLeft(u8),
    TurnRight(u8),
    /// Absolute left/right speeds
    Set(MotorSpeeds),
    Stop,
    Deadzone(u32),
    Flash(u8),
    /// Controller keep-alives carry no payload, rover acks carry the speeds
    Ack(Option<MotorSpeeds>),
    Unknown(u8),
}

impl Command {
    pub fn parse(code: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let need = |expected: usize| {
            if payload.len() < expected {
                Err(ProtocolError::PayloadTooShort {
                    code,
                    expected,
                    actual: payload.len(),
                })
            } else {
                Ok(())
            }
        };

        let command = match code {
            code::SPEED_UP => {
                need(1)?;
                Command::SpeedUp(payload[0])
            }
            code::SPEED_DOWN => {
                need(1)?;
                Command::SpeedDown(payload[0])
            }
            code::TURN_LEFT => {
                need(1)?;
                Command::TurnLeft(payload[0])
            }
            code::TURN_RIGHT => {
                need(1)?;
                Command::TurnRight(payload[0])
            }
            code::SET => {
                need(8)?;
                Command::Set(read_speeds(payload))
            }
            code::STOP => Command::Stop,
            code::DEADZONE => {
                need(4)?;
                Command::Deadzone(read_u32_le(payload, 0))
            }
            code::FLASH => {
                need(1)?;
                Command::Flash(payload[0])
            }
            code::ACK if payload.is_empty() => Command::Ack(None),
            code::ACK => {
                need(8)?;
                Command::Ack(Some(read_speeds(payload)))
            }
            other => Command::Unknown(other),
        };

        Ok(command)
    }

    pub fn code(&self) -> u8 {
        match self {
            Command::SpeedUp(_) => code::SPEED_UP,
            Command::SpeedDown(_) => code::SPEED_DOWN,
            Command::TurnLeft(_) => code::TURN_LEFT,
            Command::TurnRight(_) => code::TURN_RIGHT,
            Command::Set(_) => code::SET,
            Command::Stop => code::STOP,
            Command::Deadzone(_) => code::DEADZONE,
            Command::Flash(_) => code::FLASH,
            Command::Ack(_) => code::ACK,
            Command::Unknown(code) => *code,
        }
    }

    /// Serialize into a complete datagram
    pub fn encode(&self, id: u32) -> Vec<u8> {
        let mut writer = MessageWriter::new(self.code(), id);

        match *self {
            Command::SpeedUp(v)
            | Command::SpeedDown(v)
            | Command::TurnLeft(v)
            | Command::TurnRight(v)
            | Command::Flash(v) => writer.put_u8(v),
            Command::Set(speeds) | Command::Ack(Some(speeds)) => writer.put_speeds(speeds),
            Command::Deadzone(v) => writer.put_u32_le(v),
            Command::Stop | Command::Ack(None) | Command::Unknown(_) => {}
        }

        writer.finish()
    }
}

/// Build the acknowledgement for message `id` carrying the actuated speeds
pub fn ack(id: u32, speeds: MotorSpeeds) -> Vec<u8> {
    Command::Ack(Some(speeds)).encode(id)
}

/// Incremental message builder.
///
/// The length byte is written as a placeholder and patched by [`finish`](Self::finish).
/// Payloads stay far below the 255-byte limit of the length field.
#[derive(Debug)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new(code: u8, id: u32) -> Self {
        let mut buf = Vec::with_capacity(HEADER_LEN + 8);
        buf.push(0);
        buf.extend_from_slice(&id.to_le_bytes());
        buf.push(code);
        Self { buf }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_speeds(&mut self, speeds: MotorSpeeds) {
        self.put_u32_le(speeds.left as u32);
        self.put_u32_le(speeds.right as u32);
    }

    /// Payload bytes written after the header
    pub fn payload_bytes(&self) -> usize {
        self.buf.len() - HEADER_LEN
    }

    pub fn finish(mut self) -> Vec<u8> {
        debug_assert!(self.buf.len() <= MAX_MESSAGE_LEN);
        self.buf[0] = (self.buf.len() - 1) as u8;
        self.buf
    }
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_speeds(payload: &[u8]) -> MotorSpeeds {
    MotorSpeeds::new(
        read_u32_le(payload, 0) as i32,
        read_u32_le(payload, 4) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_layout() {
        // What the controller app sends for "stop": [5, id LE, 's']
        let datagram = Command::Stop.encode(0x0403_0201);
        assert_eq!(datagram, vec![5, 0x01, 0x02, 0x03, 0x04, b's']);
    }

    #[test]
    fn test_ack_layout() {
        let datagram = ack(7, MotorSpeeds::new(500, -500));
        assert_eq!(datagram.len(), 14);
        assert_eq!(datagram[0], 13);
        assert_eq!(&datagram[1..5], &7u32.to_le_bytes());
        assert_eq!(datagram[5], b'a');
        assert_eq!(&datagram[6..10], &500i32.to_le_bytes());
        assert_eq!(&datagram[10..14], &(-500i32).to_le_bytes());
    }

    #[test]
    fn test_decode_controller_set_message() {
        let mut datagram = vec![13, 9, 0, 0, 0, b't'];
        datagram.extend_from_slice(&250i32.to_le_bytes());
        datagram.extend_from_slice(&(-1i32).to_le_bytes());

        let message = decode(&datagram).unwrap();
        assert_eq!(message.id, 9);
        assert_eq!(message.code, b't');
        assert_eq!(
            message.command().unwrap(),
            Command::Set(MotorSpeeds::new(250, -1))
        );
    }

    #[test]
    fn test_decode_encode_preserves_fields() {
        let commands = [
            Command::SpeedUp(4),
            Command::SpeedDown(255),
            Command::TurnLeft(0),
            Command::TurnRight(17),
            Command::Set(MotorSpeeds::new(i32::MIN, i32::MAX)),
            Command::Stop,
            Command::Deadzone(30),
            Command::Flash(128),
            Command::Ack(None),
            Command::Ack(Some(MotorSpeeds::new(-3, 3))),
            Command::Unknown(b'?'),
        ];

        for (i, command) in commands.iter().enumerate() {
            let id = 0xDEAD_0000 + i as u32;
            let datagram = command.encode(id);
            let message = decode(&datagram).unwrap();
            assert_eq!(message.id, id);
            assert_eq!(message.code, command.code());
            assert_eq!(&message.command().unwrap(), command);
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut datagram = Command::SpeedUp(10).encode(1);
        datagram.push(0);
        assert_eq!(
            decode(&datagram),
            Err(ProtocolError::LengthMismatch {
                declared: 6,
                actual: 8
            })
        );

        datagram.truncate(6);
        assert!(matches!(
            decode(&datagram),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_short_datagrams_rejected() {
        assert_eq!(decode(&[]), Err(ProtocolError::Truncated { len: 0 }));
        // Consistent length byte but no room for id and command
        assert_eq!(decode(&[2, 0, 0]), Err(ProtocolError::Truncated { len: 3 }));
    }

    #[test]
    fn test_payload_too_short_for_command() {
        let datagram = [9, 1, 0, 0, 0, b't', 1, 0, 0, 0];
        let message = decode(&datagram).unwrap();
        assert_eq!(
            message.command(),
            Err(ProtocolError::PayloadTooShort {
                code: b't',
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_unknown_code_is_not_an_error() {
        let datagram = [5, 1, 0, 0, 0, b'x'];
        let message = decode(&datagram).unwrap();
        assert_eq!(message.command(), Ok(Command::Unknown(b'x')));
    }

    #[test]
    fn test_writer_tracks_payload_length() {
        let mut writer = MessageWriter::new(b'a', 1);
        assert_eq!(writer.payload_bytes(), 0);
        writer.put_u32_le(0xAABBCCDD);
        assert_eq!(writer.payload_bytes(), 4);
        let datagram = writer.finish();
        assert_eq!(datagram[0] as usize, datagram.len() - 1);
        assert_eq!(&datagram[6..], &[0xDD, 0xCC, 0xBB, 0xAA]);
    }
}
