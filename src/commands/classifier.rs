//! Error Classifier
//!
//! Maps any [`HotRodError`] onto a wire status, a human-readable message and
//! the header the error response is encoded with.
//!
//! Checks run in a fixed precedence order and the first match wins:
//!
//! | Failure                    | Status                          | Header source      |
//! |----------------------------|---------------------------------|--------------------|
//! | invalid magic / message id | `InvalidMagicOrMsgId`           | request            |
//! | unknown operation          | `UnknownOperation`              | carried            |
//! | unknown version            | `UnknownVersion`                | carried            |
//! | request parsing            | `ParseError`                    | carried            |
//! | I/O                        | `ParseError`                    | request            |
//! | timeout                    | `OperationTimedOut`             | request            |
//! | unsupported                | encoder mapping                 | request            |
//! | anything else              | encoder mapping / `ServerError` | request            |

use crate::error::HotRodError;
use crate::protocol::{OperationStatus, RequestHeader};
use std::error::Error as StdError;
use tracing::{debug, error};

/// Outcome of classifying one failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: OperationStatus,
    pub message: String,
    /// Header to encode the error response with
    pub header: RequestHeader,
}

/// Classifies `failure`, raised while `header` (if any) was being served.
pub fn classify(failure: &HotRodError, header: Option<&RequestHeader>) -> Classification {
    let cause = match failure {
        HotRodError::Completion(Some(inner)) => inner.as_ref(),
        other => other,
    };

    let mut header = header;
    let mut message = cause.to_string();
    let status = match cause {
        HotRodError::InvalidMagicId(_) => {
            error!(error = %cause, "exception reported");
            OperationStatus::InvalidMagicOrMsgId
        }
        HotRodError::UnknownOperation { header: carried, .. } => {
            error!(error = %cause, "exception reported");
            header = Some(carried.as_ref());
            OperationStatus::UnknownOperation
        }
        HotRodError::UnknownVersion { header: carried, .. } => {
            error!(error = %cause, "exception reported");
            header = Some(carried.as_ref());
            OperationStatus::UnknownVersion
        }
        HotRodError::RequestParsing { message: primary, cause: nested, header: carried } => {
            error!(error = %cause, "exception reported");
            if let Some(nested) = nested {
                message = format!("{}: {}", primary, nested);
            }
            header = carried.as_deref().or(header);
            OperationStatus::ParseError
        }
        HotRodError::CacheNotFound { header: carried, .. } => {
            debug!("{}", cause);
            header = Some(carried.as_ref());
            OperationStatus::ParseError
        }
        HotRodError::Io(_) => OperationStatus::ParseError,
        HotRodError::Timeout(_) => OperationStatus::OperationTimedOut,
        HotRodError::Unsupported(_) => {
            debug!(error = %cause, "unsupported request");
            match header {
                Some(h) => h.encoder().error_status(cause),
                None => OperationStatus::ServerError,
            }
        }
        _ => {
            error!(error = %cause, "exception reported");
            match header {
                Some(h) => {
                    message = cause_chain_message(cause);
                    h.encoder().error_status(cause)
                }
                None => OperationStatus::ServerError,
            }
        }
    };

    let header = match header {
        Some(h) => h.to_error_header(),
        None => RequestHeader::neutral(),
    };

    Classification {
        status,
        message,
        header,
    }
}

/// Joins the descriptions of every distinct error in `err`'s source chain
/// with newlines, stopping at the first error seen twice.
pub fn cause_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut seen: Vec<*const (dyn StdError + 'static)> = Vec::new();
    let mut descriptions: Vec<String> = Vec::new();
    let mut current = Some(err);

    while let Some(e) = current {
        let description = e.to_string();
        // a source at offset 0 shares its parent's address; vtables are not unique per type
        let repeated = seen.iter().zip(&descriptions).any(|(&prev, prev_description)| {
            std::ptr::eq(prev, e) || (std::ptr::addr_eq(prev, e) && *prev_description == description)
        });
        if repeated {
            break;
        }
        seen.push(e);
        descriptions.push(description);
        current = e.source();
    }

    descriptions.join("\n")
}
