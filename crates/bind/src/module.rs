use quill_ir::{self as ir, Linkage, ModuleWriter};
use quill_verifier::{verify_module, VerificationReport};
use tracing::{debug, warn};

use crate::{
    context::{ContextRef, ModuleKey, ModuleLink},
    types::FunctionType,
    Context, Error, Function, Result, SymbolClash,
};

/// Result of [`Module::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The rendered diagnostics when `valid` is `false`.
    pub error: Option<String>,
}

impl Verification {
    pub(crate) fn from_report(report: &VerificationReport) -> Self {
        if report.has_errors() {
            Self {
                valid: false,
                error: Some(report.to_string()),
            }
        } else {
            Self {
                valid: true,
                error: None,
            }
        }
    }
}

/// The exclusive owner of a module.
///
/// Dropping the handle frees the module together with its functions, blocks
/// and instructions. Handles into it become stale and report
/// [`Error::StaleHandle`] from then on.
#[derive(Debug)]
pub struct Module {
    ctx: ContextRef,
    key: ModuleKey,
}

impl Module {
    pub(crate) fn new(ctx: ContextRef, name: &str) -> Self {
        let key = ctx.insert_module(ir::Module::new(&ctx.ir, name));
        debug!(module = name, "created module");
        Self { ctx, key }
    }

    fn with_ir<R>(&self, f: impl FnOnce(&ir::Module) -> R) -> R {
        match self.ctx.with_module(self.key, f) {
            Ok(r) => r,
            Err(_) => unreachable!("module freed while its handle is alive"),
        }
    }

    fn with_ir_mut<R>(&self, f: impl FnOnce(&mut ir::Module) -> R) -> R {
        match self.ctx.with_module_mut(self.key, f) {
            Ok(r) => r,
            Err(_) => unreachable!("module freed while its handle is alive"),
        }
    }

    fn link(&self) -> ModuleLink {
        ModuleLink::new(&self.ctx, self.key)
    }

    pub fn context(&self) -> Context {
        Context::from_inner(self.ctx.clone())
    }

    pub fn name(&self) -> String {
        self.with_ir(|m| m.name.clone())
    }

    pub fn set_name(&self, name: &str) {
        self.with_ir_mut(|m| m.name = name.to_string());
    }

    pub fn source_filename(&self) -> String {
        self.with_ir(|m| m.source_filename.clone())
    }

    pub fn set_source_filename(&self, name: &str) {
        self.with_ir_mut(|m| m.source_filename = name.to_string());
    }

    pub fn target_triple(&self) -> Option<String> {
        self.with_ir(|m| m.target_triple.clone())
    }

    pub fn set_target_triple(&self, triple: &str) {
        self.with_ir_mut(|m| m.target_triple = Some(triple.to_string()));
    }

    pub fn data_layout(&self) -> Option<String> {
        self.with_ir(|m| m.data_layout.clone())
    }

    pub fn set_data_layout(&self, layout: &str) {
        self.with_ir_mut(|m| m.data_layout = Some(layout.to_string()));
    }

    /// Appends an externally linked function of type `ty`.
    ///
    /// When `name` is taken, the configured [`SymbolClash`] policy decides
    /// between renaming the new function and failing with
    /// [`Error::DuplicateSymbol`].
    pub fn create_function(&self, name: &str, ty: &FunctionType) -> Result<Function> {
        self.ctx.check_owned(ty.as_type())?;
        let policy = self.ctx.config.symbol_clash;
        let func_ty = ty.as_type().raw();

        let func = self.with_ir_mut(|m| {
            let assigned = if m.lookup_func(name).is_none() {
                name.to_string()
            } else {
                match policy {
                    SymbolClash::Reject => return Err(Error::DuplicateSymbol(name.to_string())),
                    SymbolClash::Rename => {
                        let renamed = m.unique_func_name(name);
                        warn!(
                            module = %m.name,
                            requested = name,
                            assigned = %renamed,
                            "function name already in use"
                        );
                        renamed
                    }
                }
            };
            let func = m.add_function(&assigned, Linkage::External, func_ty);
            debug!(module = %m.name, function = %assigned, "created function");
            Ok(func)
        })?;
        Ok(Function::new(self.link(), func))
    }

    pub fn function(&self, name: &str) -> Option<Function> {
        self.with_ir(|m| m.lookup_func(name))
            .map(|func| Function::new(self.link(), func))
    }

    /// Returns the functions in creation order.
    pub fn functions(&self) -> Vec<Function> {
        let funcs: Vec<_> = self.with_ir(|m| m.iter_functions().collect());
        funcs
            .into_iter()
            .map(|func| Function::new(self.link(), func))
            .collect()
    }

    /// Renders the module as textual IR.
    pub fn dump(&self) -> String {
        self.with_ir(|m| ModuleWriter::new(m).dump_string())
    }

    /// Checks the module structurally. The graph is left untouched, so
    /// building may go on after a failed verification.
    #[tracing::instrument(level = "debug", skip_all, fields(module = %self.name()))]
    pub fn verify(&self) -> Verification {
        let verification = Verification::from_report(&self.verify_report());
        debug!(valid = verification.valid, "verified module");
        verification
    }

    /// Runs the verifier and returns every diagnostic it produced.
    pub fn verify_report(&self) -> VerificationReport {
        let cfg = &self.ctx.config.verification;
        self.with_ir(|m| verify_module(m, cfg))
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        if let Some(module) = self.ctx.remove_module(self.key) {
            debug!(module = %module.name, "freed module");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BindConfig, ErrorKind};

    #[test]
    fn symbol_clash_policies() {
        let ctx = Context::new();
        let module = ctx.create_module("m");
        let fn_ty = ctx.types().function(&ctx.void_type(), &[], false).unwrap();
        module.create_function("f", &fn_ty).unwrap();
        let renamed = module.create_function("f", &fn_ty).unwrap();
        assert_eq!(renamed.name().unwrap(), "f.0");
        assert_eq!(module.functions().len(), 2);
        assert_eq!(module.function("f.0"), Some(renamed));

        let ctx = Context::with_config(BindConfig {
            symbol_clash: SymbolClash::Reject,
            ..BindConfig::default()
        });
        let module = ctx.create_module("m");
        let fn_ty = ctx.types().function(&ctx.void_type(), &[], false).unwrap();
        module.create_function("f", &fn_ty).unwrap();
        let err = module.create_function("f", &fn_ty).unwrap_err();
        assert_eq!(err, Error::DuplicateSymbol("f".to_string()));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(module.functions().len(), 1);
    }

    #[test]
    fn header_fields() {
        let ctx = Context::new();
        let module = ctx.create_module("m");
        assert_eq!(module.target_triple(), None);
        module.set_name("renamed");
        module.set_target_triple("x86_64-unknown-linux-gnu");
        module.set_data_layout("e-m:e-i64:64");
        assert_eq!(module.name(), "renamed");
        assert_eq!(
            module.target_triple().as_deref(),
            Some("x86_64-unknown-linux-gnu")
        );
        assert_eq!(module.data_layout().as_deref(), Some("e-m:e-i64:64"));
        assert!(module.dump().starts_with("; ModuleID = 'renamed'"));
    }
}
