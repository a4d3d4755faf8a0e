use chumsky::{prelude::*, Parser};

use super::ast::{Expr, Field, Item};
use super::error::ParseError;
use super::lexer;
use super::token::Token;
use crate::interner::Symbol;
use crate::utils::error::ReportableError;
use crate::utils::metadata::WithMeta;

fn ident_parser() -> impl Parser<Token, WithMeta<Symbol>, Error = Simple<Token>> + Clone {
    select! { Token::Ident(s) => s }
        .map_with_span(|s, span| WithMeta(s, span))
        .labelled("identifier")
}

fn expr_parser() -> impl Parser<Token, WithMeta<Expr>, Error = Simple<Token>> + Clone {
    recursive(|expr| {
        let lit = select! {
            Token::Nil => Expr::Nil,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Int(x) => Expr::Int(x),
            Token::Float(x) => Expr::Real(x),
            Token::Str(s) => Expr::Str(s),
        }
        .labelled("literal");

        let call = ident_parser()
            .then(
                expr.clone()
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .delimited_by(just(Token::ParenBegin), just(Token::ParenEnd)),
            )
            .map(|(f, args)| Expr::Call(f, args))
            .labelled("call");

        let reference = ident_parser().map(|s| Expr::Ref(s.0));

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::ArrayBegin), just(Token::ArrayEnd))
            .map(Expr::List)
            .labelled("list");

        let map = expr
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr)
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::BlockBegin), just(Token::BlockEnd))
            .map(Expr::Map)
            .labelled("map");

        lit.or(call)
            .or(reference)
            .or(list)
            .or(map)
            .map_with_span(|e, s| WithMeta(e, s))
            .boxed()
    })
}

fn item_parser() -> impl Parser<Token, Item, Error = Simple<Token>> + Clone {
    let field = ident_parser()
        .then_ignore(just(Token::Colon))
        .then(expr_parser())
        .map(|(name, value)| Field { name, value })
        .labelled("field");

    ident_parser()
        .then(ident_parser().or_not())
        .then(
            field
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .delimited_by(just(Token::BlockBegin), just(Token::BlockEnd)),
        )
        .map_with_span(|((kind, name), fields), span| Item {
            kind,
            name,
            fields,
            span,
        })
        .labelled("item")
}

fn parser() -> impl Parser<Token, Vec<Item>, Error = Simple<Token>> + Clone {
    item_parser().repeated().then_ignore(end())
}

/// Parses snapshot text into its items. `path` only names the source in
/// reported errors.
pub fn parse(src: &str, path: &str) -> Result<Vec<Item>, Vec<Box<dyn ReportableError>>> {
    let len = src.chars().count();
    let mut errs = Vec::<Box<dyn ReportableError>>::new();

    let (tokens, lex_errs) = lexer::lexer().parse_recovery(src);
    lex_errs
        .into_iter()
        .for_each(|e| errs.push(Box::new(ParseError::new(e, path))));

    match tokens {
        Some(t) if errs.is_empty() => {
            let (items, parse_errs) =
                parser().parse_recovery(chumsky::Stream::from_iter(len..len + 1, t.into_iter()));
            parse_errs
                .into_iter()
                .for_each(|e| errs.push(Box::new(ParseError::new(e, path))));
            match items {
                Some(items) if errs.is_empty() => Ok(items),
                _ => Err(errs),
            }
        }
        _ => Err(errs),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interner::ToSymbol;

    fn parse_ok(src: &str) -> Vec<Item> {
        match parse(src, "test.snap") {
            Ok(items) => items,
            Err(errs) => panic!("{}", crate::utils::error::dump_to_string(&errs)),
        }
    }

    #[test]
    fn single_item() {
        let items = parse_ok("class Animal { nvar: 2, super: Base, }");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.kind.0, "class".to_symbol());
        assert_eq!(item.name.as_ref().map(|n| n.0), Some("Animal".to_symbol()));
        assert_eq!(item.fields.len(), 2);
        assert_eq!(item.fields[0].name.0, "nvar".to_symbol());
        assert_eq!(item.fields[0].value.0, Expr::Int(2));
        assert_eq!(item.fields[1].value.0, Expr::Ref("Base".to_symbol()));
        assert_eq!(item.span, 0..38);
    }

    #[test]
    fn nested_expressions() {
        let items = parse_ok(
            r#"module { name: "m", members: { f: static(native(f)), l: [1, -2.5, "s"], e: {} } }"#,
        );
        assert!(items[0].name.is_none());
        let members = &items[0].fields[1].value.0;
        let Expr::Map(entries) = members else {
            panic!("expected a map, got {members:?}");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0 .0, Expr::Ref("f".to_symbol()));
        let Expr::Call(func, args) = &entries[0].1 .0 else {
            panic!("expected a call");
        };
        assert_eq!(func.0, "static".to_symbol());
        assert!(matches!(&args[0].0, Expr::Call(f, _) if f.0 == "native".to_symbol()));
        let Expr::List(l) = &entries[1].1 .0 else {
            panic!("expected a list");
        };
        assert_eq!(l[1].0, Expr::Real("-2.5".into()));
        assert_eq!(entries[2].1 .0, Expr::Map(vec![]));
    }

    #[test]
    fn empty_source() {
        assert!(parse_ok("// nothing here\n").is_empty());
    }

    #[test]
    fn errors_are_collected() {
        let errs = parse("class A { nvar 2 }", "bad.snap").unwrap_err();
        assert!(!errs.is_empty());
        let labels = errs[0].get_labels();
        assert_eq!(labels[0].0.path, "bad.snap");

        let errs = parse("class A { s: \"unterminated }", "bad.snap").unwrap_err();
        assert!(!errs.is_empty());
    }
}
