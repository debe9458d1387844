use chumsky::{input::ValueInput, pratt::*, prelude::*};

use super::lexer::Token;
use super::{BinaryOp, Expr};

/// Name, parameters and body of one definition, before duplicate checks.
pub(crate) type ParsedDefinition = (String, Vec<String>, Expr);

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

pub(crate) fn parser<'src, I>() -> impl Parser<'src, I, Vec<ParsedDefinition>, extra::Err<Rich<'src, Token<'src>>>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = SimpleSpan>,
{
    let ident = select! { Token::Ident(name) => name.to_string() };

    let expression = recursive(|expression| {
        let args = expression
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let call_or_name = ident.clone().then(args.or_not()).map(|(name, args)| match args {
            Some(args) => Expr::Call { name, args },
            None => Expr::Name(name),
        });

        let atom = choice((
            select! { Token::Number(value) => Expr::Number(value) },
            call_or_name,
            expression.delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        // `^` binds tighter than unary minus, so `-2^2` is `-(2^2)`
        atom.pratt((
            infix(right(4), just(Token::Caret), |l, _, r, _| binary(BinaryOp::Pow, l, r)),
            prefix(3, just(Token::Minus), |_, operand, _| Expr::Neg(Box::new(operand))),
            prefix(3, just(Token::Plus), |_, operand, _| operand),
            infix(left(2), just(Token::Star), |l, _, r, _| binary(BinaryOp::Mul, l, r)),
            infix(left(2), just(Token::Slash), |l, _, r, _| binary(BinaryOp::Div, l, r)),
            infix(left(1), just(Token::Plus), |l, _, r, _| binary(BinaryOp::Add, l, r)),
            infix(left(1), just(Token::Minus), |l, _, r, _| binary(BinaryOp::Sub, l, r)),
        ))
    });

    let params = ident
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let definition = ident
        .then(params)
        .then_ignore(just(Token::Equals))
        .then(expression)
        .map(|((name, params), body)| (name, params, body));

    definition.padded_by(just(Token::Semicolon).repeated()).repeated().collect()
}

#[cfg(test)]
mod tests {
    use super::super::lexer::lexer;
    use super::*;

    fn parse(source: &str) -> Vec<ParsedDefinition> {
        let tokens = lexer().parse(source).unwrap();
        let end = source.len();
        let definitions = parser()
            .parse(tokens.as_slice().map((end..end).into(), |(token, span)| (token, span)))
            .unwrap();
        definitions
    }

    #[test]
    fn test_unary_minus_wraps_power() {
        let definitions = parse("g() = -x ^ 2");
        let (name, params, body) = &definitions[0];
        assert_eq!(name, "g");
        assert!(params.is_empty());
        assert_eq!(
            *body,
            Expr::Neg(Box::new(binary(BinaryOp::Pow, Expr::Name("x".to_string()), Expr::Number(2.0))))
        );
    }

    #[test]
    fn test_calls_and_semicolons() {
        let definitions = parse(";f(a, b) = max(a, b);; g(x) = f(x, 1);");
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].1, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            definitions[1].2,
            Expr::Call { name: "f".to_string(), args: vec![Expr::Name("x".to_string()), Expr::Number(1.0)] }
        );
    }
}
