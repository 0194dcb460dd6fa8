//! Static table of builtin symbols. Each builtin name is bound to a small
//! integer at parse time so the evaluator can dispatch by index instead of
//! resolving the name through the environment chain.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

macro_rules! builtins {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Builtin {
            $($variant,)*
        }

        impl Builtin {
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }
        }
    };
}

builtins! {
    Front => "front",
    Back => "back",
    Push => "push",
    Pop => "pop",
    List => "list",
    Set => "set",
    Lambda => "lambda",
    Block => "block",
    Len => "len",
    Put => "put",
    Putln => "putln",
    If => "if",
    Eq => "==",
    NotEq => "!=",
    LtEq => "<=",
    GtEq => ">=",
    Lt => "<",
    Gt => ">",
    Seq => "seq",
    Sneq => "sneq",
    Assert => "assert",
    Loop => "loop",
    Type => "type",
    Import => "import",
    Use => "use",
    Iter => "iter",
    Not => "not",
    Or => "or",
    And => "and",
    Xor => "xor",
    Break => "break",
    At => "at",
    Clear => "clear",
    Compose => "compose",
    Decompose => "decompose",
    Box => "box",
    True => "true",
    False => "false",
    IsNil => "is_nil",
    Nil => "nil",
    Add => "+",
    Sub => "-",
    Div => "/",
    Mul => "*",
    Mod => "%",
    Var => "var",
    Exit => "exit",
    Yield => "yield",
    Try => "try",
    AsInt => "as_int",
    AsStr => "as_str",
    AsReal => "as_real",
    Throw => "throw",
    BwAnd => "bw_and",
    BwOr => "bw_or",
    BwLsh => "bw_lsh",
    BwRsh => "bw_rsh",
    BwXor => "bw_xor",
    BwNot => "bw_not",
    Rev => "rev",
    SetAt => "set_at",
    Async => "async",
    Thread => "thread",
    Chan => "chan",
    Ref => "ref",
}

static BY_NAME: LazyLock<HashMap<&'static str, Builtin>> = LazyLock::new(|| {
    Builtin::ALL
        .iter()
        .map(|builtin| (builtin.name(), *builtin))
        .collect()
});

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        BY_NAME.get(name).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
