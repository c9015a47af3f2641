//! Frame codec: wire constants, request encoding, reply parsing.
//!
//! Used by every layer that emits or parses a command. Encoding produces one
//! contiguous padded buffer; decoding pulls bytes on demand from the open
//! receive transaction.

pub mod frame;
pub mod reply;
pub mod wire_format;

pub use frame::encode_request;
pub use reply::{read_reply, ParamSink, ReplySource, ReplySummary};
pub use wire_format::{
    command_id, pad_len, Command, LenMode, END_FRAME, ERR_FRAME, FRAME_ALIGN, REPLY_FLAG,
    START_FRAME,
};
