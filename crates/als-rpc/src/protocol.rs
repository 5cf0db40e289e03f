//! Socket command protocol types.
//!
//! Requests are NUL-terminated text commands whose first space-separated
//! token is the command name. Replies are either a fixed-size binary sample
//! frame or a NUL-terminated status line such as `500 Command not recognized`.
//!
//! Sample frame, native byte order:
//! ```text
//! packed  (20 bytes): | red u32 | green u32 | blue u32 | timestamp_ns i64 |
//! aligned (24 bytes): | red u32 | green u32 | blue u32 | pad u32 | timestamp_ns i64 |
//! ```

use std::fmt;

use als_types::{AverageResult, ResponseLayout};
use bytes::{BufMut, BytesMut};

pub const CMD_TAKE_SCREENSHOT: &str = "take_screenshot";

/// Longest command accepted before a terminator must appear.
pub const MAX_COMMAND_LEN: usize = 4096;

pub const COMMAND_TERMINATOR: u8 = 0;

pub const CMD_NOT_RECOGNIZED: u16 = 500;

/// A parsed socket command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn take_screenshot() -> Self {
        Self::new(CMD_TAKE_SCREENSHOT)
    }

    /// Split a command line into name and arguments.
    ///
    /// Returns `None` for a line with no tokens.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split(' ').filter(|token| !token.is_empty());
        let name = tokens.next()?.to_string();
        Some(Self {
            name,
            args: tokens.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A reply written back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Sample(AverageResult),
    Status { code: u16, message: String },
}

impl Reply {
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_recognized() -> Self {
        Self::status(CMD_NOT_RECOGNIZED, "Command not recognized")
    }
}

/// Append one sample frame in `layout` to `dst`.
pub fn encode_sample(result: &AverageResult, layout: ResponseLayout, dst: &mut BytesMut) {
    dst.reserve(layout.frame_len());
    dst.put_u32_ne(result.red);
    dst.put_u32_ne(result.green);
    dst.put_u32_ne(result.blue);
    if layout == ResponseLayout::Aligned {
        dst.put_u32_ne(0);
    }
    dst.put_i64_ne(result.timestamp_ns);
}

/// Read one sample frame. `frame` must hold at least `layout.frame_len()`
/// bytes; returns `None` otherwise.
#[must_use]
pub fn decode_sample(frame: &[u8], layout: ResponseLayout) -> Option<AverageResult> {
    if frame.len() < layout.frame_len() {
        return None;
    }
    let u32_at = |offset: usize| -> Option<u32> {
        Some(u32::from_ne_bytes(frame.get(offset..offset + 4)?.try_into().ok()?))
    };
    let ts = layout.timestamp_offset();
    Some(AverageResult {
        red: u32_at(0)?,
        green: u32_at(4)?,
        blue: u32_at(8)?,
        timestamp_ns: i64::from_ne_bytes(frame.get(ts..ts + 8)?.try_into().ok()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AverageResult {
        AverageResult {
            red: 200,
            green: 100,
            blue: 50,
            timestamp_ns: 1_234_567_890_123,
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = Command::parse("take_screenshot").unwrap();
        assert_eq!(cmd, Command::take_screenshot());
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_parse_command_with_args() {
        let cmd = Command::parse("set  rate 10").unwrap();
        assert_eq!(cmd.name, "set");
        assert_eq!(cmd.args, vec!["rate", "10"]);
    }

    #[test]
    fn test_parse_empty_command() {
        assert!(Command::parse("").is_none());
        assert!(Command::parse("   ").is_none());
    }

    #[test]
    fn test_command_display() {
        let cmd = Command {
            name: "echo".to_string(),
            args: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(cmd.to_string(), "echo a b");
    }

    #[test]
    fn test_not_recognized_reply() {
        assert_eq!(
            Reply::not_recognized(),
            Reply::Status {
                code: 500,
                message: "Command not recognized".to_string()
            }
        );
    }

    #[test]
    fn test_packed_frame_layout() {
        let mut buf = BytesMut::new();
        encode_sample(&sample(), ResponseLayout::Packed, &mut buf);

        assert_eq!(buf.len(), 20);
        assert_eq!(buf[0..4], 200u32.to_ne_bytes());
        assert_eq!(buf[4..8], 100u32.to_ne_bytes());
        assert_eq!(buf[8..12], 50u32.to_ne_bytes());
        assert_eq!(buf[12..20], 1_234_567_890_123i64.to_ne_bytes());
    }

    #[test]
    fn test_aligned_frame_layout() {
        let mut buf = BytesMut::new();
        encode_sample(&sample(), ResponseLayout::Aligned, &mut buf);

        assert_eq!(buf.len(), 24);
        assert_eq!(buf[8..12], 50u32.to_ne_bytes());
        assert_eq!(buf[12..16], [0, 0, 0, 0]);
        assert_eq!(buf[16..24], 1_234_567_890_123i64.to_ne_bytes());
    }

    #[test]
    fn test_decode_sample_each_layout() {
        for layout in [ResponseLayout::Packed, ResponseLayout::Aligned] {
            let mut buf = BytesMut::new();
            encode_sample(&sample(), layout, &mut buf);
            assert_eq!(decode_sample(&buf, layout), Some(sample()), "{layout:?}");
        }
    }

    #[test]
    fn test_decode_short_frame() {
        assert!(decode_sample(&[0; 19], ResponseLayout::Packed).is_none());
        assert!(decode_sample(&[0; 20], ResponseLayout::Aligned).is_none());
    }
}
