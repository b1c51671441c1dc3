//! Instruction emission at a tracked insertion point.
//!
//! Every `create_*` operation resolves and type checks all of its operands
//! first and only then appends the instruction, so a failing call leaves the
//! function unchanged. Conditions that are representable but structurally
//! wrong, like a missing terminator or a mismatched return type, are left to
//! verification.
use quill_ir::{self as ir, BinaryOp, BlockId, ConstData, IcmpPred, InstData, InstId, ValueRef};
use tracing::trace;

use crate::{
    context::ContextRef,
    dispatch::{HandleFactory, NativeValue},
    operand::{Resolved, Site},
    types::StructType,
    value::{AsValue, Instruction, PhiNode},
    BasicBlock, Context, Error, Result, Type, Value,
};

/// Upper bound on the incoming capacity a phi preallocates.
pub const MAX_PHI_RESERVE: u32 = 64;

/// Where a [`Builder`] appends instructions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsertPoint {
    #[default]
    Unpositioned,
    /// At the end of the block.
    PositionedAt(BasicBlock),
}

/// A cursor emitting instructions at the end of its current block.
///
/// Emitting a terminator leaves the cursor where it is.
#[derive(Debug)]
pub struct Builder {
    ctx: ContextRef,
    insert_point: InsertPoint,
}

struct Cursor {
    site: Site,
    block: BlockId,
}

impl Builder {
    pub fn new(context: &Context) -> Self {
        Self {
            ctx: context.inner().clone(),
            insert_point: InsertPoint::Unpositioned,
        }
    }

    pub fn context(&self) -> Context {
        Context::from_inner(self.ctx.clone())
    }

    pub fn insert_point(&self) -> &InsertPoint {
        &self.insert_point
    }

    pub fn set_insert_point(&mut self, block: &BasicBlock) -> Result<()> {
        if !block.link().belongs_to(&self.ctx) {
            return Err(Error::ForeignContext);
        }
        let native = ValueRef::Block(block.func_ref(), block.id());
        if !block.link().with_module(|m| m.contains(native))? {
            return Err(Error::StaleHandle);
        }

        trace!(block = %block.id(), "moved insertion point");
        self.insert_point = InsertPoint::PositionedAt(block.clone());
        Ok(())
    }

    pub fn clear_insert_point(&mut self) {
        self.insert_point = InsertPoint::Unpositioned;
    }

    /// Returns the current block, or `None` while unpositioned.
    pub fn insert_block(&self) -> Option<BasicBlock> {
        match &self.insert_point {
            InsertPoint::PositionedAt(block) => Some(block.clone()),
            InsertPoint::Unpositioned => None,
        }
    }

    pub fn create_add(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.binary(BinaryOp::Add, lhs, rhs, name)
    }

    pub fn create_sub(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.binary(BinaryOp::Sub, lhs, rhs, name)
    }

    pub fn create_mul(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.binary(BinaryOp::Mul, lhs, rhs, name)
    }

    /// Emits an integer comparison producing an `i1`.
    pub fn create_icmp(
        &self,
        pred: IcmpPred,
        lhs: &impl AsValue,
        rhs: &impl AsValue,
        name: &str,
    ) -> Result<Value> {
        let cursor = self.cursor()?;
        let (lhs, rhs) = int_operands(&cursor.site, lhs, rhs)?;
        let inst = self.emit(&cursor, ir::Type::I1, name, |func| InstData::Icmp {
            pred,
            lhs: lhs.operand.materialize(func),
            rhs: rhs.operand.materialize(func),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    pub fn create_icmp_eq(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Eq, lhs, rhs, name)
    }

    pub fn create_icmp_ne(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Ne, lhs, rhs, name)
    }

    pub fn create_icmp_slt(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Slt, lhs, rhs, name)
    }

    pub fn create_icmp_sgt(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Sgt, lhs, rhs, name)
    }

    pub fn create_icmp_sle(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Sle, lhs, rhs, name)
    }

    pub fn create_icmp_sge(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Sge, lhs, rhs, name)
    }

    pub fn create_icmp_ult(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Ult, lhs, rhs, name)
    }

    pub fn create_icmp_ugt(&self, lhs: &impl AsValue, rhs: &impl AsValue, name: &str) -> Result<Value> {
        self.create_icmp(IcmpPred::Ugt, lhs, rhs, name)
    }

    /// Emits a stack slot for one value of `ty`. The result is a pointer to
    /// `ty`.
    pub fn create_alloca(&self, ty: &Type, name: &str) -> Result<Value> {
        let cursor = self.cursor()?;
        self.ctx.check_owned(ty)?;
        if !ty.is_sized() {
            return Err(Error::InvalidType(format!(
                "cannot allocate unsized type `{}`",
                ty.dump()
            )));
        }

        let ty = ty.raw();
        let ptr_ty = self.ctx.ir.with_ty_store_mut(|s| s.make_ptr(ty, 0));
        let inst = self.emit(&cursor, ptr_ty, name, |_| InstData::Alloca { ty })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Loads a value of `ty` through `ptr`, which must point to `ty`.
    pub fn create_load(&self, ty: &Type, ptr: &impl AsValue, name: &str) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        self.ctx.check_owned(ty)?;
        let ptr = site.resolve(&ptr.as_value())?;
        let (pointee, _) = pointer_operand(site, ptr.ty)?;
        if pointee != ty.raw() {
            return Err(site.mismatch(pointee, ty.raw()));
        }
        if !(ty.is_first_class() && ty.is_sized()) {
            return Err(Error::InvalidType(format!("cannot load `{}`", ty.dump())));
        }

        let ty = ty.raw();
        let inst = self.emit(&cursor, ty, name, |func| InstData::Load {
            ty,
            ptr: ptr.operand.materialize(func),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Stores `value` through `ptr`, which must point to the type of `value`.
    pub fn create_store(&self, value: &impl AsValue, ptr: &impl AsValue) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        let value = site.resolve(&value.as_value())?;
        let ptr = site.resolve(&ptr.as_value())?;
        let (pointee, _) = pointer_operand(site, ptr.ty)?;
        if value.ty != pointee {
            return Err(site.mismatch(pointee, value.ty));
        }
        if !self.ctx.ir.with_ty_store(|s| s.is_sized(value.ty)) {
            return Err(Error::InvalidType(format!(
                "cannot store `{}`",
                site.display(value.ty)
            )));
        }

        let inst = self.emit(&cursor, ir::Type::Void, "", |func| InstData::Store {
            value: value.operand.materialize(func),
            ptr: ptr.operand.materialize(func),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Emits a `getelementptr` over the pointee of `ptr`.
    ///
    /// The first index steps over the pointer. Each further index selects an
    /// array element or a struct field; struct fields must be selected by a
    /// constant in bounds of the struct body. Array bounds are not checked.
    pub fn create_gep(&self, ptr: &impl AsValue, indices: &[Value], name: &str) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        let ptr = site.resolve(&ptr.as_value())?;
        let (pointee, addr_space) = pointer_operand(site, ptr.ty)?;

        let mut resolved = Vec::with_capacity(indices.len());
        for (idx, index) in indices.iter().enumerate() {
            let index = site.resolve(index).map_err(|err| err.at_position(idx))?;
            if !index.ty.is_integral() {
                return Err(Error::OperandTypeMismatch {
                    index: idx,
                    expected: "integer type".to_string(),
                    found: site.display(index.ty),
                });
            }
            resolved.push(index);
        }

        let consts: Vec<_> = resolved
            .iter()
            .skip(1)
            .map(|index| {
                index
                    .operand
                    .as_const()
                    .and_then(|cst| self.ctx.ir.const_data(cst).as_int())
            })
            .collect();
        let Some(result) = self
            .ctx
            .ir
            .with_ty_store(|s| s.indexed_type(pointee, consts))
        else {
            return Err(Error::InvalidType(format!(
                "indices do not address a member of `{}`",
                site.display(pointee)
            )));
        };

        let result_ty = self
            .ctx
            .ir
            .with_ty_store_mut(|s| s.make_ptr(result, addr_space));
        let inst = self.emit(&cursor, result_ty, name, |func| InstData::Gep {
            elem_ty: pointee,
            ptr: ptr.operand.materialize(func),
            indices: resolved
                .iter()
                .map(|index| index.operand.materialize(func))
                .collect(),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Emits the address of field `field` of the struct `ptr` points to.
    pub fn create_struct_gep(
        &self,
        struct_ty: &StructType,
        ptr: &impl AsValue,
        field: u32,
        name: &str,
    ) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        self.ctx.check_owned(struct_ty.as_type())?;
        let ptr = site.resolve(&ptr.as_value())?;
        let (pointee, addr_space) = pointer_operand(site, ptr.ty)?;
        let struct_raw = struct_ty.as_type().raw();
        if pointee != struct_raw {
            return Err(site.mismatch(struct_raw, pointee));
        }
        if struct_ty.is_opaque() {
            return Err(Error::InvalidType(format!(
                "struct `{}` has no body",
                struct_ty.name()
            )));
        }
        let field_ty = struct_ty.element_type(field as usize)?.raw();

        let zero = self.ctx.ir.make_const(ConstData::int(ir::Type::I32, 0));
        let field_idx = self
            .ctx
            .ir
            .make_const(ConstData::int(ir::Type::I32, field.into()));
        let result_ty = self
            .ctx
            .ir
            .with_ty_store_mut(|s| s.make_ptr(field_ty, addr_space));
        let inst = self.emit(&cursor, result_ty, name, |func| InstData::Gep {
            elem_ty: struct_raw,
            ptr: ptr.operand.materialize(func),
            indices: [
                func.dfg.make_const_value(zero),
                func.dfg.make_const_value(field_idx),
            ]
            .into_iter()
            .collect(),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Emits an unconditional branch. `target` must be a basic block of the
    /// current function.
    pub fn create_br(&self, target: &impl AsValue) -> Result<Value> {
        let cursor = self.cursor()?;
        let dest = cursor.site.resolve_block(&target.as_value())?;
        let inst = self.emit(&cursor, ir::Type::Void, "", |_| InstData::Br { dest })?;
        Ok(self.wrap(&cursor, inst))
    }

    pub fn create_cond_br(
        &self,
        cond: &impl AsValue,
        then_block: &impl AsValue,
        else_block: &impl AsValue,
    ) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        let cond = site.resolve(&cond.as_value())?;
        if cond.ty != ir::Type::I1 {
            return Err(site.mismatch(ir::Type::I1, cond.ty));
        }
        let then_dest = site.resolve_block(&then_block.as_value())?;
        let else_dest = site.resolve_block(&else_block.as_value())?;

        let inst = self.emit(&cursor, ir::Type::Void, "", |func| InstData::CondBr {
            cond: cond.operand.materialize(func),
            then_dest,
            else_dest,
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    pub fn create_ret(&self, value: &impl AsValue) -> Result<Value> {
        let cursor = self.cursor()?;
        let value = cursor.site.resolve(&value.as_value())?;
        let inst = self.emit(&cursor, ir::Type::Void, "", |func| InstData::Ret {
            arg: Some(value.operand.materialize(func)),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    pub fn create_ret_void(&self) -> Result<Value> {
        let cursor = self.cursor()?;
        let inst = self.emit(&cursor, ir::Type::Void, "", |_| InstData::Ret { arg: None })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Emits a call of `callee`, a function of the current module.
    ///
    /// Arguments are checked one by one against the callee's parameters;
    /// errors carry the index of the offending argument.
    pub fn create_call(&self, callee: &impl AsValue, args: &[Value], name: &str) -> Result<Value> {
        let cursor = self.cursor()?;
        let site = &cursor.site;
        let callee = site.resolve_callee(&callee.as_value())?;
        let args = args
            .iter()
            .enumerate()
            .map(|(idx, arg)| site.resolve(arg).map_err(|err| err.at_position(idx)))
            .collect::<Result<Vec<_>>>()?;

        let (params, ret_ty, var_arg) = site.link.with_module(|m| {
            let sig = &m.funcs[callee].sig;
            (sig.args().to_vec(), sig.ret_ty(), sig.is_var_arg())
        })?;
        let arity_ok = if var_arg {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            let at_least = if var_arg { "at least " } else { "" };
            return Err(Error::mismatch(
                format!("{at_least}{} arguments", params.len()),
                format!("{} arguments", args.len()),
            ));
        }
        for (idx, (arg, param)) in args.iter().zip(&params).enumerate() {
            if arg.ty != *param {
                return Err(Error::OperandTypeMismatch {
                    index: idx,
                    expected: site.display(*param),
                    found: site.display(arg.ty),
                });
            }
        }

        let inst = self.emit(&cursor, ret_ty, name, |func| InstData::Call {
            callee,
            args: args
                .iter()
                .map(|arg| arg.operand.materialize(func))
                .collect(),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    /// Emits a phi without incoming values. `reserved` is a capacity hint,
    /// not a limit, and is clamped to [`MAX_PHI_RESERVE`].
    pub fn create_phi(&self, ty: &Type, reserved: u32, name: &str) -> Result<PhiNode> {
        let cursor = self.cursor()?;
        self.ctx.check_owned(ty)?;
        if !ty.is_first_class() {
            return Err(Error::InvalidType(format!(
                "`{}` cannot be the type of a phi",
                ty.dump()
            )));
        }

        let inst = self.emit(&cursor, ty.raw(), name, |_| InstData::Phi {
            args: Vec::with_capacity(reserved.min(MAX_PHI_RESERVE) as usize),
        })?;
        let site = &cursor.site;
        Ok(PhiNode::new(Instruction::new(
            site.link.clone(),
            site.func,
            inst,
        )))
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &impl AsValue,
        rhs: &impl AsValue,
        name: &str,
    ) -> Result<Value> {
        let cursor = self.cursor()?;
        let (lhs, rhs) = int_operands(&cursor.site, lhs, rhs)?;
        let inst = self.emit(&cursor, lhs.ty, name, |func| InstData::Binary {
            op,
            lhs: lhs.operand.materialize(func),
            rhs: rhs.operand.materialize(func),
        })?;
        Ok(self.wrap(&cursor, inst))
    }

    fn cursor(&self) -> Result<Cursor> {
        let InsertPoint::PositionedAt(block) = &self.insert_point else {
            return Err(Error::Unpositioned);
        };
        Ok(Cursor {
            site: Site::new(block.link().clone(), block.func_ref())?,
            block: block.id(),
        })
    }

    fn emit<F>(&self, cursor: &Cursor, result_ty: ir::Type, name: &str, make: F) -> Result<InstId>
    where
        F: FnOnce(&mut ir::Function) -> InstData,
    {
        let site = &cursor.site;
        site.link.with_module_mut(|m| {
            let func = &mut m.funcs[site.func];
            let data = make(func);
            let opcode = data.opcode();
            let (inst, _) = func.append_inst(cursor.block, data, result_ty, name);
            trace!(%opcode, %inst, block = %cursor.block, "emitted instruction");
            inst
        })
    }

    fn wrap(&self, cursor: &Cursor, inst: InstId) -> Value {
        let site = &cursor.site;
        HandleFactory::new(self.ctx.clone())
            .wrap_native(NativeValue::new(site.link.key(), ValueRef::Inst(site.func, inst)))
    }
}

fn int_operands(
    site: &Site,
    lhs: &impl AsValue,
    rhs: &impl AsValue,
) -> Result<(Resolved, Resolved)> {
    let lhs = site.resolve(&lhs.as_value())?;
    let rhs = site.resolve(&rhs.as_value())?;
    if !lhs.ty.is_integral() {
        return Err(Error::mismatch("integer type", site.display(lhs.ty)));
    }
    if lhs.ty != rhs.ty {
        return Err(site.mismatch(lhs.ty, rhs.ty));
    }
    Ok((lhs, rhs))
}

/// Returns the pointee and address space of a pointer operand.
fn pointer_operand(site: &Site, ty: ir::Type) -> Result<(ir::Type, u32)> {
    site.ctx
        .ir
        .with_ty_store(|s| s.ptr_def(ty))
        .ok_or_else(|| Error::mismatch("pointer type", site.display(ty)))
}
