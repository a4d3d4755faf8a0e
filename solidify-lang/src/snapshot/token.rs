use std::fmt;

use crate::interner::Symbol;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Ident(Symbol),

    Nil,
    True,
    False,

    Int(i64),
    // kept as text so that the token stays `Eq + Hash`
    Float(String),
    Str(String),

    Colon,
    Comma,

    ParenBegin,
    ParenEnd,
    ArrayBegin,
    ArrayEnd,
    BlockBegin,
    BlockEnd,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Ident(x) => write!(f, "{x}"),
            Token::Nil => write!(f, "nil"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Int(x) => write!(f, "{x}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(x) => write!(f, "{x:?}"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::ParenBegin => write!(f, "("),
            Token::ParenEnd => write!(f, ")"),
            Token::ArrayBegin => write!(f, "["),
            Token::ArrayEnd => write!(f, "]"),
            Token::BlockBegin => write!(f, "{{"),
            Token::BlockEnd => write!(f, "}}"),
        }
    }
}
