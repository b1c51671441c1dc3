use std::fmt;

use quill_ir::{module::FuncRef, BlockId, InstId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    InvalidValueRef,
    InvalidBlockRef,
    InvalidFuncRef,
    EmptyBlock,
    MissingTerminator,
    TerminatorNotLast,
    BranchToEntryDisallowed,
    PhiNotAtBlockTop,
    PhiInEntryBlock,
    PhiArgCountMismatchPreds,
    PhiHasNonPredIncoming,
    PhiDuplicateIncomingBlock,
    PhiIncomingTypeMismatch,
    UseBeforeDefInBlock,
    DefDoesNotDominateUse,
    PhiIncomingNotAvailableOnEdge,
    InstOperandTypeMismatch,
    CallArgTypeMismatch,
    CallArityMismatch,
    ReturnTypeMismatch,
    UnstorableTypeInMemoryOp,
    GepTypeComputationFailed,
    InvalidSignature,
}

impl DiagnosticCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::InvalidValueRef => 1,
            Self::InvalidBlockRef => 2,
            Self::InvalidFuncRef => 3,
            Self::EmptyBlock => 200,
            Self::MissingTerminator => 201,
            Self::TerminatorNotLast => 202,
            Self::BranchToEntryDisallowed => 303,
            Self::PhiNotAtBlockTop => 400,
            Self::PhiInEntryBlock => 401,
            Self::PhiArgCountMismatchPreds => 402,
            Self::PhiHasNonPredIncoming => 403,
            Self::PhiDuplicateIncomingBlock => 404,
            Self::PhiIncomingTypeMismatch => 405,
            Self::UseBeforeDefInBlock => 500,
            Self::DefDoesNotDominateUse => 501,
            Self::PhiIncomingNotAvailableOnEdge => 502,
            Self::InstOperandTypeMismatch => 600,
            Self::CallArgTypeMismatch => 602,
            Self::CallArityMismatch => 603,
            Self::ReturnTypeMismatch => 604,
            Self::UnstorableTypeInMemoryOp => 605,
            Self::GepTypeComputationFailed => 606,
            Self::InvalidSignature => 610,
        }
    }

    pub fn as_str(self) -> String {
        format!("IR{:04}", self.as_u16())
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => "error".fmt(f),
            Self::Warning => "warning".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Module,
    Function(FuncRef),
    Block {
        func: FuncRef,
        block: BlockId,
    },
    Inst {
        func: FuncRef,
        block: Option<BlockId>,
        inst: InstId,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => "module".fmt(f),
            Self::Function(func) => write!(f, "{func}"),
            Self::Block { func, block } => write!(f, "{func} {block}"),
            Self::Inst {
                func,
                block: Some(block),
                inst,
            } => write!(f, "{func} {block} {inst}"),
            Self::Inst {
                func,
                block: None,
                inst,
            } => write!(f, "{func} {inst}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    /// The function symbol, like `@main`.
    pub function_name: Option<String>,
    /// The label of the enclosing block, like `%entry`.
    pub block_label: Option<String>,
    /// The offending instruction in textual form.
    pub inst_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub primary: Location,
    pub notes: Vec<Note>,
    pub context: Option<DiagnosticContext>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
        primary: Location,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            primary,
            notes: Vec::new(),
            context: None,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Error, message, primary)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Warning, message, primary)
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            message: message.into(),
        });
        self
    }

    pub fn with_context(mut self, context: DiagnosticContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;

        let context = self.context.as_ref();
        match context.and_then(|cx| cx.function_name.as_deref()) {
            Some(function_name) => {
                write!(f, "  --> {function_name}")?;
                if let Some(label) = context.and_then(|cx| cx.block_label.as_deref()) {
                    write!(f, " {label}")?;
                }
                writeln!(f)?;
            }
            None => writeln!(f, "  --> {}", self.primary)?,
        }

        if let Some(inst_text) = context.and_then(|cx| cx.inst_text.as_deref()) {
            writeln!(f, "   | {inst_text}")?;
        }

        for note in &self.notes {
            writeln!(f, "  note: {}", note.message)?;
        }

        Ok(())
    }
}
