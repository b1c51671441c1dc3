use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the handle layer.
///
/// Every error is raised before the IR graph is touched, so a failed call
/// leaves the graph as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("builder has no insertion point")]
    Unpositioned,

    #[error("expected {expected}, found {found}")]
    WrongHandleKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("type mismatch at index {index}: expected {expected}, found {found}")]
    OperandTypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("{entity} index {index} is out of range (count is {count})")]
    OutOfRange {
        entity: &'static str,
        index: usize,
        count: usize,
    },

    #[error("invalid {}{}: {reason}", operand_noun(.position), at_index(.position))]
    InvalidOperand {
        position: Option<usize>,
        reason: String,
    },

    #[error("handle refers to a module that has been dropped")]
    StaleHandle,

    #[error("handle belongs to a different context")]
    ForeignContext,

    #[error("struct `{name}` already has a different body")]
    StructBodyAlreadySet { name: String },

    #[error("function `{0}` is already defined")]
    DuplicateSymbol(String),
}

/// Coarse classification of [`Error`], so callers can tell a wrong shape from
/// a wrong index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Type,
    Range,
    InvalidOperand,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unpositioned
            | Self::StaleHandle
            | Self::ForeignContext
            | Self::StructBodyAlreadySet { .. }
            | Self::DuplicateSymbol(_) => ErrorKind::Usage,
            Self::WrongHandleKind { .. }
            | Self::TypeMismatch { .. }
            | Self::OperandTypeMismatch { .. }
            | Self::InvalidType(_) => ErrorKind::Type,
            Self::OutOfRange { .. } => ErrorKind::Range,
            Self::InvalidOperand { .. } => ErrorKind::InvalidOperand,
        }
    }

    pub(crate) fn operand(reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            position: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Attaches the argument index to an operand error.
    pub(crate) fn at_position(self, idx: usize) -> Self {
        match self {
            Self::InvalidOperand { reason, .. } => Self::InvalidOperand {
                position: Some(idx),
                reason,
            },
            err => err,
        }
    }
}

fn operand_noun(position: &Option<usize>) -> &'static str {
    if position.is_some() {
        "argument"
    } else {
        "operand"
    }
}

fn at_index(position: &Option<usize>) -> String {
    position.map(|idx| format!(" at index {idx}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_messages() {
        let err = Error::operand("value is null");
        assert_eq!(err.to_string(), "invalid operand: value is null");
        assert_eq!(err.kind(), ErrorKind::InvalidOperand);

        let err = Error::operand("value is null").at_position(2);
        assert_eq!(err.to_string(), "invalid argument at index 2: value is null");
    }

    #[test]
    fn kinds() {
        let range = Error::OutOfRange {
            entity: "argument",
            index: 2,
            count: 2,
        };
        assert_eq!(range.kind(), ErrorKind::Range);
        assert_eq!(
            range.to_string(),
            "argument index 2 is out of range (count is 2)"
        );
        assert_eq!(Error::Unpositioned.kind(), ErrorKind::Usage);
        assert_eq!(Error::mismatch("i32", "i64").kind(), ErrorKind::Type);
    }
}
