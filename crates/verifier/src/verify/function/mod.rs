use rustc_hash::FxHashMap;
use quill_ir::{
    module::FuncRef, BlockId, ControlFlowGraph, FuncWriter, Function, InstId, Module, Type,
    ValueId,
};

use crate::{
    diagnostic::{Diagnostic, DiagnosticContext, Location},
    report::VerificationReport,
    VerifierConfig,
};

mod dominance;
mod layout_cfg;
mod phi;
mod referential;
mod signature;
mod type_rules;

pub(super) fn verify_function_in_module(
    module: &Module,
    func_ref: FuncRef,
    cfg: &VerifierConfig,
) -> VerificationReport {
    let mut verifier = FunctionVerifier::new(module, func_ref, cfg);
    verifier.run();
    verifier.report
}

pub(super) struct FunctionVerifier<'a> {
    pub(super) module: &'a Module,
    pub(super) func_ref: FuncRef,
    pub(super) func: &'a Function,
    pub(super) cfg: &'a VerifierConfig,
    pub(super) report: VerificationReport,

    /// `false` once an operand or destination was found not to exist. Later
    /// passes index the function with operands, so they are skipped.
    pub(super) refs_ok: bool,
    pub(super) block_order: Vec<BlockId>,
    pub(super) inst_index_in_block: FxHashMap<InstId, usize>,
    pub(super) graph: ControlFlowGraph,
}

trait FunctionPass {
    fn enabled(_cfg: &VerifierConfig) -> bool {
        true
    }

    fn run(verifier: &mut FunctionVerifier<'_>);
}

struct ReferentialPass;
struct SignaturePass;
struct LayoutPass;
struct PhiPass;
struct TypePass;
struct DominancePass;

impl FunctionPass for ReferentialPass {
    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_referential_integrity();
    }
}

impl FunctionPass for SignaturePass {
    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_signature_and_returns();
    }
}

impl FunctionPass for LayoutPass {
    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_block_and_cfg_rules();
    }
}

impl FunctionPass for PhiPass {
    fn enabled(cfg: &VerifierConfig) -> bool {
        cfg.should_check_phis()
    }

    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_phi_rules();
    }
}

impl FunctionPass for TypePass {
    fn enabled(cfg: &VerifierConfig) -> bool {
        cfg.should_check_types()
    }

    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_type_rules();
    }
}

impl FunctionPass for DominancePass {
    fn enabled(cfg: &VerifierConfig) -> bool {
        cfg.should_check_dominance()
    }

    fn run(verifier: &mut FunctionVerifier<'_>) {
        verifier.check_dominance_rules();
    }
}

impl<'a> FunctionVerifier<'a> {
    fn new(module: &'a Module, func_ref: FuncRef, cfg: &'a VerifierConfig) -> Self {
        let func = &module.funcs[func_ref];
        let block_order: Vec<_> = func.layout.iter_block().collect();
        let mut inst_index_in_block = FxHashMap::default();
        for &block in &block_order {
            for (idx, inst) in func.layout.iter_inst(block).enumerate() {
                inst_index_in_block.insert(inst, idx);
            }
        }

        Self {
            module,
            func_ref,
            func,
            cfg,
            report: VerificationReport::default(),
            refs_ok: true,
            block_order,
            inst_index_in_block,
            graph: ControlFlowGraph::default(),
        }
    }

    fn run(&mut self) {
        self.run_pass::<ReferentialPass>();
        if !self.refs_ok {
            return;
        }
        self.graph.compute(self.func);

        self.run_pass::<SignaturePass>();
        self.run_pass::<LayoutPass>();
        self.run_pass::<PhiPass>();
        self.run_pass::<TypePass>();
        self.run_pass::<DominancePass>();
    }

    fn run_pass<P: FunctionPass>(&mut self) {
        if P::enabled(self.cfg) && !self.report.is_full(self.cfg.max_diagnostics) {
            P::run(self);
        }
    }

    pub(super) fn emit(&mut self, diagnostic: Diagnostic) {
        let diagnostic = self.with_diagnostic_context(diagnostic);
        self.report.push(diagnostic, self.cfg.max_diagnostics);
    }

    fn with_diagnostic_context(&self, mut diagnostic: Diagnostic) -> Diagnostic {
        let mut context = diagnostic.context.take().unwrap_or(DiagnosticContext {
            function_name: None,
            block_label: None,
            inst_text: None,
        });

        if context.function_name.is_none() {
            context.function_name = Some(format!("@{}", self.func.sig.name()));
        }

        if context.block_label.is_none() && self.refs_ok {
            let block = match &diagnostic.primary {
                Location::Block { block, .. } => Some(*block),
                Location::Inst { block, .. } => *block,
                _ => None,
            };
            context.block_label = block
                .filter(|&block| self.func.dfg.has_block(block))
                .map(|block| self.block_name(block));
        }

        if context.inst_text.is_none() && self.refs_ok {
            if let Location::Inst { inst, .. } = &diagnostic.primary {
                let mut text = String::new();
                if FuncWriter::new(self.module, self.func_ref)
                    .write_inst(&mut text, *inst)
                    .is_ok()
                {
                    context.inst_text = Some(text.trim().to_string());
                }
            }
        }

        diagnostic.context = Some(context);
        diagnostic
    }

    pub(super) fn inst_location(&self, inst: InstId) -> Location {
        Location::Inst {
            func: self.func_ref,
            block: self.func.layout.inst_block(inst),
            inst,
        }
    }

    pub(super) fn block_location(&self, block: BlockId) -> Location {
        Location::Block {
            func: self.func_ref,
            block,
        }
    }

    pub(super) fn value_ty(&self, value: ValueId) -> Type {
        self.func.dfg.value_ty(value)
    }

    pub(super) fn inst_result_ty(&self, inst: InstId) -> Option<Type> {
        self.func
            .dfg
            .inst_result(inst)
            .map(|value| self.func.dfg.value_ty(value))
    }

    pub(super) fn display_ty(&self, ty: Type) -> String {
        self.module
            .ctx
            .with_ty_store(|s| s.display(ty).to_string())
    }

    pub(super) fn block_name(&self, block: BlockId) -> String {
        match self.func.dfg.block_name(block) {
            Some(name) => format!("%{name}"),
            None => block.to_string(),
        }
    }
}
