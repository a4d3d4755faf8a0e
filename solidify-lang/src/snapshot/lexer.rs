use chumsky::prelude::*;
use chumsky::Parser;

use super::token::Token;
use crate::interner::ToSymbol;
use crate::utils::metadata::Span;

fn whitespace() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    let single_line = just("//")
        .then(take_until(text::newline().or(end())))
        .ignored();
    let multi_line = just("/*").then(take_until(just("*/"))).ignored();
    filter(|c: &char| c.is_whitespace())
        .ignored()
        .or(single_line)
        .or(multi_line)
        .repeated()
        .ignored()
}

fn number() -> impl Parser<char, Token, Error = Simple<char>> + Clone {
    let sign = just('-').or_not().map(|s| s.is_some());

    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10))
        .map(|((e, s), d): ((char, Option<char>), String)| {
            format!("{e}{}{d}", s.map(String::from).unwrap_or_default())
        });
    let float = sign
        .clone()
        .then(text::int(10))
        .then_ignore(just('.'))
        .then(text::digits(10).or_not())
        .then(exponent.or_not())
        .map(|(((neg, int), frac), exp)| {
            Token::Float(format!(
                "{}{int}.{}{}",
                if neg { "-" } else { "" },
                frac.unwrap_or_default(),
                exp.unwrap_or_default()
            ))
        });

    let hex = just("0x")
        .or(just("0X"))
        .ignore_then(text::digits(16))
        .try_map(|s: String, span| {
            i64::from_str_radix(&s, 16)
                .map_err(|e| Simple::custom(span, format!("invalid hex literal: {e}")))
        });
    let dec = text::int(10).try_map(|s: String, span| {
        s.parse::<i64>()
            .map_err(|e| Simple::custom(span, format!("invalid integer literal: {e}")))
    });
    let int = sign
        .then(hex.or(dec))
        .map(|(neg, v)| Token::Int(if neg { -v } else { v }));

    float.or(int)
}

fn string() -> impl Parser<char, Token, Error = Simple<char>> + Clone {
    let hexdigit = filter(|c: &char| c.is_ascii_hexdigit());
    let byte = hexdigit
        .clone()
        .then(hexdigit)
        .try_map(|(hi, lo), span| match u8::from_str_radix(&format!("{hi}{lo}"), 16) {
            Ok(b) if b.is_ascii() => Ok(b as char),
            _ => Err(Simple::custom(span, "\\x escapes must be ASCII, use \\u{..}")),
        });
    let unicode = text::digits(16)
        .delimited_by(just('{'), just('}'))
        .try_map(|s: String, span| {
            u32::from_str_radix(&s, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Simple::custom(span, "invalid unicode escape"))
        });
    let escape = just('\\').ignore_then(choice((
        just('\\'),
        just('"'),
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('x').ignore_then(byte),
        just('u').ignore_then(unicode),
    )));
    just('"')
        .ignore_then(filter(|c: &char| *c != '\\' && *c != '"').or(escape).repeated())
        .then_ignore(just('"'))
        .collect::<String>()
        .map(Token::Str)
        .labelled("string")
}

pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    let ident = text::ident().map(|ident: String| match ident.as_str() {
        "nil" => Token::Nil,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(ident.to_symbol()),
    });
    let punct = one_of("(){}[]:,").map(|c| match c {
        '(' => Token::ParenBegin,
        ')' => Token::ParenEnd,
        '{' => Token::BlockBegin,
        '}' => Token::BlockEnd,
        '[' => Token::ArrayBegin,
        ']' => Token::ArrayEnd,
        ':' => Token::Colon,
        _ => Token::Comma,
    });
    let token = number()
        .or(string())
        .or(ident)
        .or(punct)
        .recover_with(skip_then_retry_until([]));

    whitespace()
        .ignore_then(
            token
                .map_with_span(|tok, span| (tok, span))
                .then_ignore(whitespace())
                .repeated(),
        )
        .then_ignore(end())
}
