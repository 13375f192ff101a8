// Lowers the AST into non-SSA IR. Variable reads become LoadVar and writes AssignVar,
// keyed by a per-function name-to-variable-id map; SSA conversion later dissolves
// both. Control flow is built structurally: `if` becomes a conditional jump into
// then/else blocks that meet at a join block, `while` a header block re-evaluating the
// condition with a back edge from the body. Function parameters are ordinary
// variables initialized from the argument values at the top of the entry block, so
// the renamer treats them like any other assignment. Statements after a `return` land
// in a fresh unreachable block, which the analyses then ignore.

//! AST to IR lowering.

use hashbrown::HashMap;

use super::ast::{Expr, FunctionDecl, Module, Stmt, TypeName};
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use crate::ir::graph::{
    BlockRef, DataType, FuncRef, InsertPos, InstRef, IrContext, ValueRef, VarId,
};

/// Build IR for every function in the module. Functions are declared up
/// front so calls can reference functions defined later in the file.
pub fn build_module<'arena>(
    ctx: &mut IrContext<'arena>,
    session: &CompilationSession<'arena>,
    module: &Module,
) -> CompileResult<Vec<FuncRef>> {
    let mut func_map: HashMap<String, FuncRef> = HashMap::new();
    let mut funcs = Vec::new();

    for decl in &module.functions {
        let return_type = match decl.return_type {
            TypeName::Void => DataType::Void,
            TypeName::Int64 => DataType::Int64,
        };
        let func = ctx.new_function(session, &decl.name, return_type);
        func_map.insert(decl.name.clone(), func);
        funcs.push(func);
    }

    for (decl, &func) in module.functions.iter().zip(&funcs) {
        let mut builder = FunctionBuilder::new(ctx, session, &func_map, func);
        builder.build(decl)?;
    }
    Ok(funcs)
}

struct FunctionBuilder<'a, 'arena> {
    ctx: &'a mut IrContext<'arena>,
    session: &'a CompilationSession<'arena>,
    func_map: &'a HashMap<String, FuncRef>,
    func: FuncRef,
    block: BlockRef,
    /// Variable name to id, flat per-function scope.
    vars: HashMap<String, VarId>,
    terminated: bool,
}

impl<'a, 'arena> FunctionBuilder<'a, 'arena> {
    fn new(
        ctx: &'a mut IrContext<'arena>,
        session: &'a CompilationSession<'arena>,
        func_map: &'a HashMap<String, FuncRef>,
        func: FuncRef,
    ) -> Self {
        let block = ctx.create_block(func);
        Self {
            ctx,
            session,
            func_map,
            func,
            block,
            vars: HashMap::new(),
            terminated: false,
        }
    }

    fn build(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        // Parameters are plain variables assigned from the incoming
        // argument values.
        for name in &decl.params {
            let arg = self.ctx.add_function_arg(self.func, DataType::Int64);
            let var = self.declare(name);
            let assign = self.ctx.new_assign_var(var, arg);
            self.append(assign);
        }

        for stmt in &decl.body {
            self.stmt(stmt)?;
        }

        if !self.terminated {
            let ret = self.ctx.new_return(None);
            self.append(ret);
        }
        log::debug!("ir built for `{}`", self.ctx.function_name(self.func));
        Ok(())
    }

    fn append(&mut self, inst: InstRef) {
        self.ctx.insert_instruction(self.block, inst, InsertPos::Bottom);
    }

    fn declare(&mut self, name: &str) -> VarId {
        if let Some(&var) = self.vars.get(name) {
            return var;
        }
        let var = self.ctx.new_var(self.session, name);
        self.vars.insert(name.to_string(), var);
        var
    }

    fn lookup(&self, name: &str) -> CompileResult<VarId> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownVariable {
                name: name.to_string(),
            })
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        if self.terminated {
            // Code after a return: give it a block, it will be unreachable.
            self.block = self.ctx.create_block(self.func);
            self.terminated = false;
        }

        match stmt {
            Stmt::Declaration { name, init } => {
                let var = self.declare(name);
                if let Some(init) = init {
                    let value = self.expr(init)?;
                    let assign = self.ctx.new_assign_var(var, value);
                    self.append(assign);
                }
            }
            Stmt::Assign { name, value } => {
                let var = self.lookup(name)?;
                let value = self.expr(value)?;
                let assign = self.ctx.new_assign_var(var, value);
                self.append(assign);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond_value = self.expr(cond)?;
                let then_block = self.ctx.create_block(self.func);
                let join_block = self.ctx.create_block(self.func);
                let else_block = match else_body {
                    Some(_) => self.ctx.create_block(self.func),
                    None => join_block,
                };

                let branch = self.ctx.new_cond_jump(then_block, else_block, cond_value);
                self.append(branch);

                self.block = then_block;
                self.terminated = false;
                for stmt in then_body {
                    self.stmt(stmt)?;
                }
                if !self.terminated {
                    let jump = self.ctx.new_jump(join_block);
                    self.append(jump);
                }

                if let Some(else_body) = else_body {
                    self.block = else_block;
                    self.terminated = false;
                    for stmt in else_body {
                        self.stmt(stmt)?;
                    }
                    if !self.terminated {
                        let jump = self.ctx.new_jump(join_block);
                        self.append(jump);
                    }
                }

                self.block = join_block;
                self.terminated = false;
            }
            Stmt::While { cond, body } => {
                let header = self.ctx.create_block(self.func);
                let jump_in = self.ctx.new_jump(header);
                self.append(jump_in);

                self.block = header;
                self.terminated = false;
                let cond_value = self.expr(cond)?;
                let body_block = self.ctx.create_block(self.func);
                let exit_block = self.ctx.create_block(self.func);
                let branch = self.ctx.new_cond_jump(body_block, exit_block, cond_value);
                self.append(branch);

                self.block = body_block;
                self.terminated = false;
                for stmt in body {
                    self.stmt(stmt)?;
                }
                if !self.terminated {
                    let back = self.ctx.new_jump(header);
                    self.append(back);
                }

                self.block = exit_block;
                self.terminated = false;
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => Some(self.expr(expr)?),
                    None => None,
                };
                let ret = self.ctx.new_return(value);
                self.append(ret);
                self.terminated = true;
            }
            Stmt::ExprStmt(expr) => {
                if let Expr::Call { name, args } = expr {
                    // A bare call may discard its result, void included.
                    self.call(name, args)?;
                } else {
                    self.expr(expr)?;
                }
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> CompileResult<ValueRef> {
        match expr {
            Expr::Number(n) => Ok(self.ctx.const_int(*n)),
            Expr::Variable(name) => {
                let var = self.lookup(name)?;
                let load = self.ctx.new_load_var(var);
                self.append(load);
                Ok(self.ctx.inst_result(load).expect("load has a result"))
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs_value = self.expr(lhs)?;
                let rhs_value = self.expr(rhs)?;
                if self.ctx.value_type(lhs_value) != DataType::Int64
                    || self.ctx.value_type(rhs_value) != DataType::Int64
                {
                    return Err(CompileError::Type(format!(
                        "operands of `{}` must be int64",
                        op.name()
                    )));
                }
                let inst = self.ctx.new_binary(*op, lhs_value, rhs_value);
                self.append(inst);
                Ok(self.ctx.inst_result(inst).expect("binary has a result"))
            }
            Expr::Call { name, args } => {
                let inst = self.call(name, args)?;
                self.ctx.inst_result(inst).ok_or_else(|| {
                    CompileError::Type(format!("void function `{}` used as a value", name))
                })
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> CompileResult<InstRef> {
        let callee = *self
            .func_map
            .get(name)
            .ok_or_else(|| CompileError::UnknownFunction {
                name: name.to_string(),
            })?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.expr(arg)?);
        }
        let inst = self.ctx.new_call(callee, &arg_values);
        self.append(inst);
        Ok(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;
    use crate::ir::graph::InstKind;
    use bumpalo::Bump;

    #[test]
    fn test_if_produces_diamond() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let module = parse("void f() { int64 a = 1; if (a == 1) { a = 2; } int64 b = a; }").unwrap();
        let funcs = build_module(&mut ctx, &session, &module).unwrap();

        let entry = ctx.entry_block(funcs[0]).unwrap();
        // Entry ends in a conditional jump with two successors.
        assert_eq!(ctx.successors(entry).count(), 2);
    }

    #[test]
    fn test_while_produces_back_edge() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let module = parse("void f() { int64 i = 0; while (i < 3) { i = i + 1; } }").unwrap();
        let funcs = build_module(&mut ctx, &session, &module).unwrap();

        let entry = ctx.entry_block(funcs[0]).unwrap();
        let header = ctx.successors(entry).next().unwrap();
        // The header has two predecessors: the entry and the loop body.
        assert_eq!(ctx.predecessor_count(header), 2);
    }

    #[test]
    fn test_unknown_variable() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let module = parse("void f() { a = 1; }").unwrap();
        let err = build_module(&mut ctx, &session, &module).unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { name } if name == "a"));
    }

    #[test]
    fn test_params_become_assignments() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let module = parse("int64 id(int64 x) { return x; }").unwrap();
        let funcs = build_module(&mut ctx, &session, &module).unwrap();

        let entry = ctx.entry_block(funcs[0]).unwrap();
        let first = ctx.block_insts(entry)[0];
        assert!(matches!(ctx.inst_kind(first), InstKind::AssignVar(_)));
        assert_eq!(ctx.function_args(funcs[0]).len(), 1);
    }

    #[test]
    fn test_void_call_as_value_rejected() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut ctx = IrContext::new();
        let module = parse("void g() { } int64 f() { return g() + 1; }").unwrap();
        let err = build_module(&mut ctx, &session, &module).unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }
}
