//! Transport codecs for the socket command protocol.
//!
//! [`CommandCodec`] is the daemon side: it splits the byte stream on NUL
//! terminators into [`Command`]s and writes [`Reply`]s. [`SampleCodec`] is
//! the client side: it writes commands and reads back either a fixed-size
//! sample frame or a status line.
//!
//! Command framing:
//! ```text
//! +---------------------------+------+
//! |  N bytes (N <= 4096)      | 0x00 |
//! |  "name arg1 arg2 ..."     |      |
//! +---------------------------+------+
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use als_types::ResponseLayout;

pub use crate::error::CodecError;
use crate::protocol::{
    COMMAND_TERMINATOR, Command, MAX_COMMAND_LEN, Reply, decode_sample, encode_sample,
};

/// Length of the `"NNN "` prefix that starts every status line.
const STATUS_PREFIX_LEN: usize = 4;

fn find_terminator(src: &BytesMut, from: usize) -> Option<usize> {
    src[from..]
        .iter()
        .position(|&b| b == COMMAND_TERMINATOR)
        .map(|pos| from + pos)
}

/// Daemon-side codec: decodes commands, encodes replies.
#[derive(Debug, Default)]
pub struct CommandCodec {
    layout: ResponseLayout,
    /// Bytes already scanned for a terminator.
    next_index: usize,
}

impl CommandCodec {
    #[must_use]
    pub fn new(layout: ResponseLayout) -> Self {
        Self {
            layout,
            next_index: 0,
        }
    }

    #[must_use]
    pub fn layout(&self) -> ResponseLayout {
        self.layout
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(end) = find_terminator(src, self.next_index) else {
                if src.len() > MAX_COMMAND_LEN {
                    return Err(CodecError::CommandTooLong(src.len()));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            if end > MAX_COMMAND_LEN {
                return Err(CodecError::CommandTooLong(end));
            }

            let frame = src.split_to(end + 1);
            self.next_index = 0;

            let line = std::str::from_utf8(&frame[..end])?;
            if let Some(command) = Command::parse(line) {
                return Ok(Some(command));
            }
            trace!("Ignoring empty command");
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        if !src.is_empty() {
            debug!("Dropping {} bytes of unterminated command", src.len());
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<Reply> for CommandCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Reply::Sample(result) => encode_sample(&result, self.layout, dst),
            Reply::Status { code, message } => {
                let line = format!("{code} {message}");
                dst.reserve(line.len() + 1);
                dst.put_slice(line.as_bytes());
                dst.put_u8(COMMAND_TERMINATOR);
            }
        }
        Ok(())
    }
}

/// Client-side codec: encodes commands, decodes replies.
///
/// A status line starts with three ASCII digits and a space. A sample frame
/// never does, because its first field is a channel mean no larger than 255,
/// so its second and third bytes are zero in either byte order.
#[derive(Debug, Default)]
pub struct SampleCodec {
    layout: ResponseLayout,
}

impl SampleCodec {
    #[must_use]
    pub fn new(layout: ResponseLayout) -> Self {
        Self { layout }
    }

    fn is_status(prefix: &[u8]) -> bool {
        prefix.len() >= STATUS_PREFIX_LEN
            && prefix[..3].iter().all(u8::is_ascii_digit)
            && prefix[3] == b' '
    }
}

impl Decoder for SampleCodec {
    type Item = Reply;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < STATUS_PREFIX_LEN {
            return Ok(None);
        }

        if Self::is_status(src) {
            let Some(end) = find_terminator(src, 0) else {
                if src.len() > MAX_COMMAND_LEN {
                    return Err(CodecError::CommandTooLong(src.len()));
                }
                return Ok(None);
            };
            let frame = src.split_to(end + 1);
            let line = std::str::from_utf8(&frame[..end])?;
            let (code, message) = line
                .split_once(' ')
                .and_then(|(code, message)| Some((code.parse().ok()?, message)))
                .ok_or_else(|| CodecError::MalformedStatus(line.to_string()))?;
            return Ok(Some(Reply::status(code, message)));
        }

        let frame_len = self.layout.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        Ok(decode_sample(&frame, self.layout).map(Reply::Sample))
    }
}

impl Encoder<Command> for SampleCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        if line.len() > MAX_COMMAND_LEN {
            return Err(CodecError::CommandTooLong(line.len()));
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(COMMAND_TERMINATOR);
        Ok(())
    }
}
