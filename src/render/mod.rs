pub mod chunks;
pub mod text;

use crate::parser::summary::SummaryRecord;
use chunks::ChunkedMessage;

/// Record → annotated text → size-capped webhook payload.
pub fn to_message(record: &SummaryRecord) -> ChunkedMessage {
    let annotated = text::annotate(record);
    ChunkedMessage {
        blocks: chunks::render(&annotated),
    }
}
