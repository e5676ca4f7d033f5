use crate::buffer::LineId;
use crate::marks::MarkId;
use thiserror::Error;

/// Errors reported by metadata operations.
///
/// These are "operation declined" outcomes; none of them leaves the metadata in a
/// partially-updated state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// The mark already has an attachment; detach or move it instead.
    #[error("mark {0:?} is already attached to a line")]
    AlreadyAttached(MarkId),

    /// The mark is not attached to the given line.
    #[error("mark {mark:?} is not attached to line {line:?}")]
    NotAttached {
        /// The mark that was expected to be attached.
        mark: MarkId,
        /// The line it was expected on.
        line: LineId,
    },

    /// The line handle is stale (the line was removed).
    #[error("line {0:?} no longer exists in the document")]
    StaleLine(LineId),

    /// A mutating call was issued from inside a notification of an in-flight operation.
    #[error("another metadata operation is in flight")]
    Busy,
}
