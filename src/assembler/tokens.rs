use rustc_hash::FxHashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Sentinel for reads past the end of the stream
    None,
    NewLine,

    Identifier,

    ImportKeyword,
    AsKeyword,
    StructKeyword,
    FuncKeyword,
    ProcKeyword,
    IntKeyword,
    LongKeyword,
    DoubleKeyword,
    PointerKeyword,
    GcPointerKeyword,

    // Integer literals keep the base they were written in
    BinInteger,
    OctInteger,
    DecInteger,
    HexInteger,
    Decimal,

    Character,
    StringLiteral,

    Plus,             // +
    Minus,            // -
    Colon,            // :
    Dot,              // .
    Comma,            // ,
    LeftBracket,      // [
    RightBracket,     // ]
    LeftParenthesis,  // (
    RightParenthesis, // )
}

impl TokenKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TokenKind::BinInteger
                | TokenKind::OctInteger
                | TokenKind::DecInteger
                | TokenKind::HexInteger
        )
    }

    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::IntKeyword
                | TokenKind::LongKeyword
                | TokenKind::DoubleKeyword
                | TokenKind::PointerKeyword
                | TokenKind::GcPointerKeyword
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenData {
    None,
    Integer(u64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub word: String,
    pub suffix: String,
    pub data: TokenData,
    pub kind: TokenKind,
    pub line: u32,
}

impl Token {
    pub fn new(word: impl Into<String>, kind: TokenKind, line: u32) -> Self {
        Token {
            word: word.into(),
            suffix: String::new(),
            data: TokenData::None,
            kind,
            line,
        }
    }

    /// The sentinel handed out when the parser reads past end-of-stream.
    /// Carries only a line number.
    pub fn empty(line: u32) -> Self {
        Token::new("", TokenKind::None, line)
    }

    pub fn integer_value(&self) -> u64 {
        match self.data {
            TokenData::Integer(value) => value,
            _ => 0,
        }
    }

    pub fn real_value(&self) -> f64 {
        match self.data {
            TokenData::Real(value) => value,
            _ => 0.0,
        }
    }

    pub fn text(&self) -> &str {
        match &self.data {
            TokenData::Text(text) => text,
            _ => "",
        }
    }
}

static KEYWORDS: LazyLock<FxHashMap<&'static str, TokenKind>> = LazyLock::new(|| {
    let mut keywords = FxHashMap::default();
    keywords.insert("import", TokenKind::ImportKeyword);
    keywords.insert("as", TokenKind::AsKeyword);
    keywords.insert("struct", TokenKind::StructKeyword);
    keywords.insert("func", TokenKind::FuncKeyword);
    keywords.insert("proc", TokenKind::ProcKeyword);
    keywords.insert("int", TokenKind::IntKeyword);
    keywords.insert("long", TokenKind::LongKeyword);
    keywords.insert("double", TokenKind::DoubleKeyword);
    keywords.insert("pointer", TokenKind::PointerKeyword);
    keywords.insert("gcpointer", TokenKind::GcPointerKeyword);
    keywords
});

pub fn keyword_kind(word: &str) -> Option<TokenKind> {
    KEYWORDS.get(word).copied()
}
