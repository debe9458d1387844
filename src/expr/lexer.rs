use std::fmt;

use chumsky::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Token<'src> {
    Number(f64),
    Ident(&'src str),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Equals,
    Semicolon,
}

impl Token<'_> {
    /// Operators and opening brackets; each one can add a level to the parsed tree.
    pub(crate) fn nests(&self) -> bool {
        matches!(
            self,
            Token::LParen | Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Caret
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(number) => write!(f, "{number}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::Equals => write!(f, "="),
            Token::Semicolon => write!(f, ";"),
        }
    }
}

pub(crate) fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let fraction = just('.').then(text::digits(10));
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(text::digits(10));

    let number = choice((text::digits(10).then(fraction.clone().or_not()).ignored(), fraction.ignored()))
        .then(exponent.or_not())
        .to_slice()
        .try_map(|text: &str, span| {
            text.parse()
                .map(Token::Number)
                .map_err(|_| Rich::custom(span, format!("invalid number '{text}'")))
        });

    // `**` is accepted as an alias for `^`
    let operator = choice((
        just("**").to(Token::Caret),
        just('^').to(Token::Caret),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('=').to(Token::Equals),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just(';').to(Token::Semicolon),
    ));

    let ident = text::ascii::ident().map(Token::Ident);

    let comment = just('#').then(any().and_is(just('\n').not()).repeated()).padded();

    let token = choice((number, operator, ident))
        .map_with(|token, extra| (token, extra.span()))
        .padded_by(comment.clone().repeated())
        .padded();

    comment.repeated().ignore_then(token.repeated().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        lexer().parse(source).unwrap().into_iter().map(|(token, _)| token).collect()
    }

    #[test]
    fn test_numbers_and_exponents() {
        assert_eq!(
            tokens("1.5e-3 2E4 .25"),
            vec![Token::Number(1.5e-3), Token::Number(2e4), Token::Number(0.25)]
        );
    }

    #[test]
    fn test_trailing_e_is_a_name() {
        assert_eq!(tokens("2*e"), vec![Token::Number(2.0), Token::Star, Token::Ident("e")]);
    }

    #[test]
    fn test_double_star_is_power_and_comments_are_skipped() {
        assert_eq!(tokens("# squared\nx ** 2 # square\n"), vec![Token::Ident("x"), Token::Caret, Token::Number(2.0)]);
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let lexed = lexer().parse("f(x) = x").unwrap();
        assert_eq!(lexed[4], (Token::Equals, SimpleSpan::from(5..6)));
    }

    #[test]
    fn test_unexpected_character() {
        let result = lexer().parse("x $ y");
        assert!(result.has_errors());
        assert_eq!(result.errors().next().map(|error| error.span().start), Some(2));
    }
}
