use std::fmt::{self, Display};

use crate::{
    cfg::BlockId,
    lex::{ArithOp, CmpOp, VarRef},
};

#[derive(Debug)]
pub struct Program {
    pub externals: Vec<External>,
    pub globals: Vec<Global>,
    pub entry: Function,
}

#[derive(Debug)]
pub struct External {
    pub name: &'static str,
    pub variadic: bool,
}

#[derive(Debug)]
pub struct Global {
    pub name: &'static str,
    pub elements: u32,
}

#[derive(Debug)]
pub struct Function {
    pub name: &'static str,
    pub blocks: Vec<Block>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Local(pub u32);

impl Display for Local {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "%{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub label: i32,
    pub ops: Vec<Op>,
    pub terminator: Terminator,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    LoadConst(i32, Local),
    LoadVar(VarRef, Local),
    StoreVar(Local, VarRef),
    Arith(ArithOp, Local, Local, Local),
    Compare(CmpOp, Local, Local, Local),
    PrintCall { format: String, arg: Option<Local> },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        condition: Local,
        then_to: BlockId,
        else_to: BlockId,
    },
    Return(i32),
}
