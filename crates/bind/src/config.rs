use quill_verifier::{VerificationLevel, VerifierConfig};

/// What [`Module::create_function`](crate::Module::create_function) does when
/// the requested name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolClash {
    /// Append a numeric suffix (`name.0`, `name.1`, ...) and log the rename.
    #[default]
    Rename,
    /// Fail with [`Error::DuplicateSymbol`](crate::Error::DuplicateSymbol).
    Reject,
}

#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Configuration used by [`Module::verify`](crate::Module::verify).
    pub verification: VerifierConfig,
    pub symbol_clash: SymbolClash,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            verification: VerifierConfig::for_level(VerificationLevel::Full),
            symbol_clash: SymbolClash::default(),
        }
    }
}
