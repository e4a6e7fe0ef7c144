//! Compiled substrate program
//!
//! Names are resolved to frame slots at compile time, so the tree holds no
//! strings for variables. Everything here is plain data (`Send + Sync`) and
//! is shared between test-case threads behind an `Arc`.

use super::builtins::Builtin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// `/`, truncating or true division depending on dialect
    Div,
    /// `//`, always floor division
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Local(usize),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `i++`, `--a[j]`: `delta` is +1/-1, `postfix` yields the old value
    Step {
        target: Box<Target>,
        delta: i64,
        postfix: bool,
    },
    Builtin(Builtin, Vec<Expr>),
    /// Call to the function being judged
    Recurse(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Local(usize),
    Index(Expr, Expr),
    /// `[a, b] = pair`
    Unpack(Vec<Target>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(Target, Expr),
    Compound(Target, BinaryOp, Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    While(Expr, Vec<Stmt>),
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Stmt>,
        body: Vec<Stmt>,
    },
    ForOf {
        target: Target,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Block(Vec<Stmt>),
}

/// A compiled function: parameters occupy the first slots of its frame
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub params: Vec<String>,
    /// Every slot name, parameters first
    pub slots: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Program {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}
