use lachs::Span;

#[lachs::token]
pub enum Token {
    // Declaration keywords
    #[terminal("val")]
    Val,
    #[terminal("rec")]
    Rec,
    #[terminal("fun")]
    Fun,
    #[terminal("datatype")]
    Datatype,
    #[terminal("exception")]
    Exception,
    #[terminal("type")]
    Type,
    #[terminal("and")]
    And,
    // Expression keywords
    #[terminal("fn")]
    FnKw,
    #[terminal("let")]
    Let,
    #[terminal("in")]
    In,
    #[terminal("end")]
    End,
    #[terminal("if")]
    If,
    #[terminal("then")]
    Then,
    #[terminal("else")]
    Else,
    #[terminal("case")]
    Case,
    #[terminal("of")]
    Of,
    #[terminal("raise")]
    Raise,
    #[terminal("handle")]
    Handle,
    #[terminal("as")]
    As,
    #[terminal("andalso")]
    Andalso,
    #[terminal("orelse")]
    Orelse,
    #[terminal("div")]
    Div,
    #[terminal("mod")]
    Mod,
    #[terminal("o")]
    Compose,
    // Query keywords
    #[terminal("from")]
    From,
    #[terminal("where")]
    Where,
    #[terminal("yield")]
    Yield,
    #[terminal("group")]
    Group,
    #[terminal("compute")]
    Compute,
    // Literals and identifiers
    #[literal("[0-9]+\\.[0-9]+")]
    Real,
    #[literal("[0-9]+")]
    Integer,
    #[literal(r#""([^"\\]|\\.)*""#)]
    StringLiteral,
    #[literal(r##"#"([^"\\]|\\.)""##)]
    CharLiteral,
    #[literal("[a-zA-Z][a-zA-Z0-9_']*")]
    Ident,
    #[literal("''[a-z][a-zA-Z0-9_]*")]
    EqTyVar,
    #[literal("'[a-z][a-zA-Z0-9_]*")]
    TyVar,
    #[literal(r"\(\*([^*]|\*[^)])*\*\)")]
    Comment,
    // Punctuation
    #[terminal(";")]
    Semi,
    #[terminal(",")]
    Comma,
    #[terminal("(")]
    LParen,
    #[terminal(")")]
    RParen,
    #[terminal("[")]
    LBracket,
    #[terminal("]")]
    RBracket,
    #[terminal("{")]
    LBrace,
    #[terminal("}")]
    RBrace,
    #[terminal("...")]
    Ellipsis,
    #[terminal("_")]
    Underscore,
    #[terminal("|")]
    Bar,
    #[terminal("=>")]
    DoubleArrow,
    #[terminal("->")]
    Arrow,
    #[terminal("::")]
    Cons,
    #[terminal(":")]
    Colon,
    #[terminal("=")]
    Equals,
    #[terminal("<>")]
    NotEquals,
    #[terminal("<=")]
    LtEq,
    #[terminal(">=")]
    GtEq,
    #[terminal("<")]
    Lt,
    #[terminal(">")]
    Gt,
    // Operators
    #[terminal("+")]
    Plus,
    #[terminal("-")]
    Minus,
    #[terminal("*")]
    Star,
    #[terminal("/")]
    Slash,
    #[terminal("^")]
    Caret,
    #[terminal("@")]
    At,
    #[terminal("~")]
    Tilde,
    #[terminal("#")]
    Hash,
}

impl Token {
    pub fn pos(&self) -> Span {
        match self {
            Token::Val(inner) => inner.position.clone(),
            Token::Rec(inner) => inner.position.clone(),
            Token::Fun(inner) => inner.position.clone(),
            Token::Datatype(inner) => inner.position.clone(),
            Token::Exception(inner) => inner.position.clone(),
            Token::Type(inner) => inner.position.clone(),
            Token::And(inner) => inner.position.clone(),
            Token::FnKw(inner) => inner.position.clone(),
            Token::Let(inner) => inner.position.clone(),
            Token::In(inner) => inner.position.clone(),
            Token::End(inner) => inner.position.clone(),
            Token::If(inner) => inner.position.clone(),
            Token::Then(inner) => inner.position.clone(),
            Token::Else(inner) => inner.position.clone(),
            Token::Case(inner) => inner.position.clone(),
            Token::Of(inner) => inner.position.clone(),
            Token::Raise(inner) => inner.position.clone(),
            Token::Handle(inner) => inner.position.clone(),
            Token::As(inner) => inner.position.clone(),
            Token::Andalso(inner) => inner.position.clone(),
            Token::Orelse(inner) => inner.position.clone(),
            Token::Div(inner) => inner.position.clone(),
            Token::Mod(inner) => inner.position.clone(),
            Token::Compose(inner) => inner.position.clone(),
            Token::From(inner) => inner.position.clone(),
            Token::Where(inner) => inner.position.clone(),
            Token::Yield(inner) => inner.position.clone(),
            Token::Group(inner) => inner.position.clone(),
            Token::Compute(inner) => inner.position.clone(),
            Token::Real(inner) => inner.position.clone(),
            Token::Integer(inner) => inner.position.clone(),
            Token::StringLiteral(inner) => inner.position.clone(),
            Token::CharLiteral(inner) => inner.position.clone(),
            Token::Ident(inner) => inner.position.clone(),
            Token::EqTyVar(inner) => inner.position.clone(),
            Token::TyVar(inner) => inner.position.clone(),
            Token::Comment(inner) => inner.position.clone(),
            Token::Semi(inner) => inner.position.clone(),
            Token::Comma(inner) => inner.position.clone(),
            Token::LParen(inner) => inner.position.clone(),
            Token::RParen(inner) => inner.position.clone(),
            Token::LBracket(inner) => inner.position.clone(),
            Token::RBracket(inner) => inner.position.clone(),
            Token::LBrace(inner) => inner.position.clone(),
            Token::RBrace(inner) => inner.position.clone(),
            Token::Ellipsis(inner) => inner.position.clone(),
            Token::Underscore(inner) => inner.position.clone(),
            Token::Bar(inner) => inner.position.clone(),
            Token::DoubleArrow(inner) => inner.position.clone(),
            Token::Arrow(inner) => inner.position.clone(),
            Token::Cons(inner) => inner.position.clone(),
            Token::Colon(inner) => inner.position.clone(),
            Token::Equals(inner) => inner.position.clone(),
            Token::NotEquals(inner) => inner.position.clone(),
            Token::LtEq(inner) => inner.position.clone(),
            Token::GtEq(inner) => inner.position.clone(),
            Token::Lt(inner) => inner.position.clone(),
            Token::Gt(inner) => inner.position.clone(),
            Token::Plus(inner) => inner.position.clone(),
            Token::Minus(inner) => inner.position.clone(),
            Token::Star(inner) => inner.position.clone(),
            Token::Slash(inner) => inner.position.clone(),
            Token::Caret(inner) => inner.position.clone(),
            Token::At(inner) => inner.position.clone(),
            Token::Tilde(inner) => inner.position.clone(),
            Token::Hash(inner) => inner.position.clone(),
        }
    }

    /// Returns a human-readable description of the token
    pub fn describe(&self) -> String {
        match self {
            Token::Val(_) => "'val'".to_string(),
            Token::Rec(_) => "'rec'".to_string(),
            Token::Fun(_) => "'fun'".to_string(),
            Token::Datatype(_) => "'datatype'".to_string(),
            Token::Exception(_) => "'exception'".to_string(),
            Token::Type(_) => "'type'".to_string(),
            Token::And(_) => "'and'".to_string(),
            Token::FnKw(_) => "'fn'".to_string(),
            Token::Let(_) => "'let'".to_string(),
            Token::In(_) => "'in'".to_string(),
            Token::End(_) => "'end'".to_string(),
            Token::If(_) => "'if'".to_string(),
            Token::Then(_) => "'then'".to_string(),
            Token::Else(_) => "'else'".to_string(),
            Token::Case(_) => "'case'".to_string(),
            Token::Of(_) => "'of'".to_string(),
            Token::Raise(_) => "'raise'".to_string(),
            Token::Handle(_) => "'handle'".to_string(),
            Token::As(_) => "'as'".to_string(),
            Token::Andalso(_) => "'andalso'".to_string(),
            Token::Orelse(_) => "'orelse'".to_string(),
            Token::Div(_) => "'div'".to_string(),
            Token::Mod(_) => "'mod'".to_string(),
            Token::Compose(_) => "'o'".to_string(),
            Token::From(_) => "'from'".to_string(),
            Token::Where(_) => "'where'".to_string(),
            Token::Yield(_) => "'yield'".to_string(),
            Token::Group(_) => "'group'".to_string(),
            Token::Compute(_) => "'compute'".to_string(),
            Token::Real(inner) => format!("real '{}'", inner.value),
            Token::Integer(inner) => format!("integer '{}'", inner.value),
            Token::StringLiteral(inner) => format!("string {}", inner.value),
            Token::CharLiteral(inner) => format!("character {}", inner.value),
            Token::Ident(inner) => format!("identifier '{}'", inner.value),
            Token::EqTyVar(inner) => format!("type variable '{}'", inner.value),
            Token::TyVar(inner) => format!("type variable '{}'", inner.value),
            Token::Comment(_) => "comment".to_string(),
            Token::Semi(_) => "';'".to_string(),
            Token::Comma(_) => "','".to_string(),
            Token::LParen(_) => "'('".to_string(),
            Token::RParen(_) => "')'".to_string(),
            Token::LBracket(_) => "'['".to_string(),
            Token::RBracket(_) => "']'".to_string(),
            Token::LBrace(_) => "'{'".to_string(),
            Token::RBrace(_) => "'}'".to_string(),
            Token::Ellipsis(_) => "'...'".to_string(),
            Token::Underscore(_) => "'_'".to_string(),
            Token::Bar(_) => "'|'".to_string(),
            Token::DoubleArrow(_) => "'=>'".to_string(),
            Token::Arrow(_) => "'->'".to_string(),
            Token::Cons(_) => "'::'".to_string(),
            Token::Colon(_) => "':'".to_string(),
            Token::Equals(_) => "'='".to_string(),
            Token::NotEquals(_) => "'<>'".to_string(),
            Token::LtEq(_) => "'<='".to_string(),
            Token::GtEq(_) => "'>='".to_string(),
            Token::Lt(_) => "'<'".to_string(),
            Token::Gt(_) => "'>'".to_string(),
            Token::Plus(_) => "'+'".to_string(),
            Token::Minus(_) => "'-'".to_string(),
            Token::Star(_) => "'*'".to_string(),
            Token::Slash(_) => "'/'".to_string(),
            Token::Caret(_) => "'^'".to_string(),
            Token::At(_) => "'@'".to_string(),
            Token::Tilde(_) => "'~'".to_string(),
            Token::Hash(_) => "'#'".to_string(),
        }
    }
}

/// Lex a source string into tokens, dropping comments.
pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let tokens = Token::lex(input).map_err(|e| format!("{e}"))?;
    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Comment(_)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_keywords_and_idents() {
        let tokens = tokenize("val x = 5").unwrap();
        assert!(matches!(tokens[0], Token::Val(_)));
        assert!(matches!(tokens[1], Token::Ident(_)));
        assert!(matches!(tokens[2], Token::Equals(_)));
        assert!(matches!(tokens[3], Token::Integer(_)));
    }

    #[test]
    fn lex_real_before_integer() {
        let tokens = tokenize("10.25").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], Token::Real(_)));
    }

    #[test]
    fn lex_compound_symbols() {
        let tokens = tokenize(":: : => = -> <> <=").unwrap();
        assert!(matches!(tokens[0], Token::Cons(_)));
        assert!(matches!(tokens[1], Token::Colon(_)));
        assert!(matches!(tokens[2], Token::DoubleArrow(_)));
        assert!(matches!(tokens[3], Token::Equals(_)));
        assert!(matches!(tokens[4], Token::Arrow(_)));
        assert!(matches!(tokens[5], Token::NotEquals(_)));
        assert!(matches!(tokens[6], Token::LtEq(_)));
    }

    #[test]
    fn lex_type_variables() {
        let tokens = tokenize("'a ''b").unwrap();
        assert!(matches!(tokens[0], Token::TyVar(_)));
        assert!(matches!(tokens[1], Token::EqTyVar(_)));
    }

    #[test]
    fn lex_drops_comments() {
        let tokens = tokenize("1 (* a comment *) 2").unwrap();
        assert_eq!(tokens.len(), 2);
    }
}
