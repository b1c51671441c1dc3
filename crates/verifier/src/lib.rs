mod config;
mod diagnostic;
mod report;
mod verify;

pub use config::{VerificationLevel, VerifierConfig};
pub use diagnostic::{Diagnostic, DiagnosticCode, DiagnosticContext, Location, Note, Severity};
pub use report::VerificationReport;
pub use verify::{verify_function, verify_module, verify_module_or_panic};

