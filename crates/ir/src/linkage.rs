use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Linkage of symbols.
pub enum Linkage {
    #[default]
    /// The symbol is visible from outside of the module. A function with this
    /// linkage and no body is a declaration of a symbol defined elsewhere.
    External,

    /// The symbol is defined in the module, and can NOT be referenced from
    /// another module.
    Internal,

    /// Like `Internal`, and the symbol is also left out of the symbol table.
    Private,
}

impl fmt::Display for Linkage {
    /// External linkage is implied and prints nothing.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            Self::External => Ok(()),
            Self::Internal => write!(f, "internal"),
            Self::Private => write!(f, "private"),
        }
    }
}

impl FromStr for Linkage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "external" => Ok(Self::External),
            "internal" => Ok(Self::Internal),
            "private" => Ok(Self::Private),
            _ => Err(()),
        }
    }
}
