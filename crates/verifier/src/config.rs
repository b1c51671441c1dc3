#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    /// Block structure, terminators and return types only.
    Fast,
    /// Adds phi rules and operand types.
    Standard,
    /// Adds dominance of definitions over uses.
    Full,
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub level: VerificationLevel,
    /// Diagnostics past this count are dropped. `0` means unlimited.
    pub max_diagnostics: usize,
    pub check_dominance: bool,
    pub check_types: bool,
}

impl VerifierConfig {
    pub fn for_level(level: VerificationLevel) -> Self {
        match level {
            VerificationLevel::Fast => Self {
                level,
                max_diagnostics: 200,
                check_dominance: false,
                check_types: false,
            },
            VerificationLevel::Standard => Self {
                level,
                max_diagnostics: 200,
                check_dominance: false,
                check_types: true,
            },
            VerificationLevel::Full => Self {
                level,
                max_diagnostics: 500,
                check_dominance: true,
                check_types: true,
            },
        }
    }

    pub fn should_check_phis(&self) -> bool {
        !matches!(self.level, VerificationLevel::Fast)
    }

    pub fn should_check_types(&self) -> bool {
        self.check_types || !matches!(self.level, VerificationLevel::Fast)
    }

    pub fn should_check_dominance(&self) -> bool {
        self.check_dominance || matches!(self.level, VerificationLevel::Full)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::for_level(VerificationLevel::Standard)
    }
}
