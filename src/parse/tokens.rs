//! Token recognition
//!
//! Splits an expanded line on whitespace (quoted text stays in one word),
//! peels glued group braces and chord brackets off each word, and types the
//! pieces. Note words, rests, chord ends and post-events are parsed here so
//! the builder works on structured values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::expand::Expansion;
use super::note::{parse_note_word, parse_post_events, parse_suffix, NoteError, NoteWord, PostEvent, Suffix};
use crate::models::{Clef, Meter, Tempo};

/// Token types for notation lines
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TokenKind {
    Note(NoteWord),
    Rest(Suffix),
    ChordStart,
    /// `>` plus the chord's duration and post-events
    ChordEnd(Suffix),
    /// Pitchless duration (rhythm staves only)
    Duration(Suffix),
    /// Free-standing post-events attaching to the previous slot
    PostEvent(Vec<PostEvent>),
    Tuplet { actual: u32, normal: u32 },
    GroupOpen,
    GroupClose,
    Ottava(i8),
    Clef(Clef),
    Time(Meter),
    Tempo(Tempo),
    BarSeparator,
}

/// Token with its place in the expanded and the original text
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset in the expanded text
    pub position: usize,
    /// Byte offset in the original line
    pub origin: usize,
}

#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum TokenizationError {
    #[error("'{word}' starts like a note but is not one")]
    AmbiguousLetter { word: String, offset: usize },

    #[error("text is missing its closing quote")]
    UnterminatedQuote { offset: usize },

    #[error("chord is missing its closing '>'")]
    UnterminatedChord { offset: usize },

    #[error("chord opened inside another chord")]
    NestedChord { offset: usize },

    #[error("'>' without an open chord")]
    StrayChordEnd { offset: usize },

    #[error("malformed {directive}")]
    MalformedDirective { directive: String, offset: usize },

    #[error("unknown word '{word}'")]
    UnknownWord { word: String, offset: usize },

    #[error("'{word}': {reason}")]
    Malformed { word: String, reason: NoteError, offset: usize },
}

impl TokenizationError {
    /// Byte offset in the original line
    pub fn offset(&self) -> usize {
        match self {
            TokenizationError::AmbiguousLetter { offset, .. }
            | TokenizationError::UnterminatedQuote { offset }
            | TokenizationError::UnterminatedChord { offset }
            | TokenizationError::NestedChord { offset }
            | TokenizationError::StrayChordEnd { offset }
            | TokenizationError::MalformedDirective { offset, .. }
            | TokenizationError::UnknownWord { offset, .. }
            | TokenizationError::Malformed { offset, .. } => *offset,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TokenizationError::AmbiguousLetter { .. } => "ambiguous_letter",
            TokenizationError::UnterminatedQuote { .. } => "unterminated_quote",
            TokenizationError::UnterminatedChord { .. } => "unterminated_chord",
            TokenizationError::NestedChord { .. } => "nested_chord",
            TokenizationError::StrayChordEnd { .. } => "stray_chord_end",
            TokenizationError::MalformedDirective { .. } => "malformed_directive",
            TokenizationError::UnknownWord { .. } => "unknown_word",
            TokenizationError::Malformed { .. } => "malformed_word",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PieceKind {
    Word,
    GroupOpen,
    GroupClose,
    ChordStart,
    ChordEnd,
}

#[derive(Clone, Copy, Debug)]
struct Piece<'a> {
    kind: PieceKind,
    text: &'a str,
    start: usize,
}

/// Tokenize an expanded line
pub fn tokenize(expansion: &Expansion) -> Result<Vec<Token>, TokenizationError> {
    let words = split_words(expansion)?;
    let mut pieces = Vec::new();
    for (start, word) in words {
        split_pieces(word, start, &mut pieces);
    }

    let mut tokens = Vec::with_capacity(pieces.len());
    let mut open_chord: Option<usize> = None;
    let mut index = 0;

    while index < pieces.len() {
        let piece = pieces[index];
        let origin = expansion.original_offset(piece.start);
        index += 1;

        let kind = match piece.kind {
            PieceKind::GroupOpen => TokenKind::GroupOpen,
            PieceKind::GroupClose => TokenKind::GroupClose,
            PieceKind::ChordStart => {
                if open_chord.is_some() {
                    return Err(TokenizationError::NestedChord { offset: origin });
                }
                open_chord = Some(origin);
                TokenKind::ChordStart
            }
            PieceKind::ChordEnd => {
                if open_chord.take().is_none() {
                    return Err(TokenizationError::StrayChordEnd { offset: origin });
                }
                let suffix = parse_suffix(&piece.text[1..]).map_err(|reason| TokenizationError::Malformed {
                    word: piece.text.to_string(),
                    reason,
                    offset: origin,
                })?;
                TokenKind::ChordEnd(suffix)
            }
            PieceKind::Word if is_directive(piece.text) => {
                let (kind, text, used) = read_directive(&pieces[index - 1..], origin)?;
                index += used;
                tokens.push(Token {
                    kind,
                    text,
                    position: piece.start,
                    origin,
                });
                continue;
            }
            PieceKind::Word => classify_word(piece.text, origin)?,
        };

        tokens.push(Token {
            kind,
            text: piece.text.to_string(),
            position: piece.start,
            origin,
        });
    }

    if let Some(offset) = open_chord {
        return Err(TokenizationError::UnterminatedChord { offset });
    }

    log::debug!("tokenized {} tokens from '{}'", tokens.len(), expansion.text);
    Ok(tokens)
}

/// Whitespace-separated words with their byte start; quotes may hold spaces
fn split_words(expansion: &Expansion) -> Result<Vec<(usize, &str)>, TokenizationError> {
    let text = expansion.text.as_str();
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c == '"' {
            quote = match quote {
                Some(_) => None,
                None => Some(i),
            };
        }
        if c.is_whitespace() && quote.is_none() {
            if let Some(s) = start.take() {
                words.push((s, &text[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(q) = quote {
        return Err(TokenizationError::UnterminatedQuote {
            offset: expansion.original_offset(q),
        });
    }
    if let Some(s) = start {
        words.push((s, &text[s..]));
    }
    Ok(words)
}

/// Peel `{`, `}`, `<` and `>` off a word
fn split_pieces<'a>(word: &'a str, start: usize, out: &mut Vec<Piece<'a>>) {
    let mut body = word;
    let mut body_start = start;

    while let Some(rest) = body.strip_prefix('{') {
        out.push(Piece {
            kind: PieceKind::GroupOpen,
            text: "{",
            start: body_start,
        });
        body = rest;
        body_start += 1;
    }

    let mut closes = 0;
    let mut opens = 0;
    if body.matches('"').count() % 2 == 0 {
        while body.ends_with('}') {
            body = &body[..body.len() - 1];
            closes += 1;
        }
        // `\tuplet 3/2{` leaves the brace on the ratio
        while body.ends_with('{') {
            body = &body[..body.len() - 1];
            opens += 1;
        }
    }

    while let Some(rest) = body.strip_prefix('<') {
        out.push(Piece {
            kind: PieceKind::ChordStart,
            text: "<",
            start: body_start,
        });
        body = rest;
        body_start += 1;
    }

    match find_chord_end(body) {
        Some(at) => {
            if at > 0 {
                out.push(Piece {
                    kind: PieceKind::Word,
                    text: &body[..at],
                    start: body_start,
                });
            }
            out.push(Piece {
                kind: PieceKind::ChordEnd,
                text: &body[at..],
                start: body_start + at,
            });
        }
        None if !body.is_empty() => out.push(Piece {
            kind: PieceKind::Word,
            text: body,
            start: body_start,
        }),
        None => {}
    }

    for n in 0..opens {
        out.push(Piece {
            kind: PieceKind::GroupOpen,
            text: "{",
            start: body_start + body.len() + n,
        });
    }
    for n in 0..closes {
        out.push(Piece {
            kind: PieceKind::GroupClose,
            text: "}",
            start: body_start + body.len() + opens + n,
        });
    }
}

/// First `>` outside quotes that is not an accent or diminuendo
fn find_chord_end(word: &str) -> Option<usize> {
    let mut in_quote = false;
    let mut previous = None;
    for (i, c) in word.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '>' if !in_quote && !matches!(previous, Some('\\' | '-' | '^' | '_')) => return Some(i),
            _ => {}
        }
        previous = Some(c);
    }
    None
}

const DIRECTIVES: [&str; 8] = [
    "\\tuplet", "\\tup", "\\times", "\\ottava", "\\ott", "\\time", "\\tempo", "\\clef",
];

fn is_directive(word: &str) -> bool {
    DIRECTIVES.contains(&word)
}

/// Read a directive and its arguments; returns (kind, text, argument pieces used)
fn read_directive(pieces: &[Piece], origin: usize) -> Result<(TokenKind, String, usize), TokenizationError> {
    let name = pieces[0].text;
    let malformed = || TokenizationError::MalformedDirective {
        directive: name.to_string(),
        offset: origin,
    };

    let args: Vec<&str> = pieces[1..]
        .iter()
        .take(3)
        .take_while(|p| p.kind == PieceKind::Word)
        .map(|p| p.text)
        .collect();
    let first = *args.first().ok_or_else(malformed)?;
    let joined = |n: usize| format!("{} {}", name, args[..n].join(" "));

    let kind = match name {
        "\\tuplet" | "\\tup" | "\\times" => {
            let (a, b) = parse_fraction(first).ok_or_else(malformed)?;
            // \times states the ratio the other way round
            let (actual, normal) = if name == "\\times" { (b, a) } else { (a, b) };
            TokenKind::Tuplet { actual, normal }
        }
        "\\ottava" | "\\ott" => {
            let level: i8 = first.trim_start_matches('#').parse().map_err(|_| malformed())?;
            if !(-2..=2).contains(&level) {
                return Err(malformed());
            }
            TokenKind::Ottava(level)
        }
        "\\time" => TokenKind::Time(Meter::parse(first).ok_or_else(malformed)?),
        "\\clef" => TokenKind::Clef(Clef::from_keyword(first).ok_or_else(malformed)?),
        "\\tempo" => {
            for n in 1..=args.len() {
                if let Some(tempo) = Tempo::parse(&args[..n].concat()) {
                    return Ok((TokenKind::Tempo(tempo), joined(n), n));
                }
            }
            return Err(malformed());
        }
        _ => return Err(malformed()),
    };

    Ok((kind, joined(1), 1))
}

fn parse_fraction(text: &str) -> Option<(u32, u32)> {
    let (a, b) = text.split_once('/')?;
    let a: u32 = a.parse().ok()?;
    let b: u32 = b.parse().ok()?;
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

fn classify_word(word: &str, offset: usize) -> Result<TokenKind, TokenizationError> {
    if let Some(clef) = Clef::from_keyword(word) {
        return Ok(TokenKind::Clef(clef));
    }

    let malformed = |reason: NoteError| TokenizationError::Malformed {
        word: word.to_string(),
        reason,
        offset,
    };
    let unknown = || TokenizationError::UnknownWord {
        word: word.to_string(),
        offset,
    };

    let Some(first) = word.chars().next() else {
        return Err(unknown());
    };

    match first {
        'a'..='g' => match parse_note_word(word) {
            Ok(note) => Ok(TokenKind::Note(note)),
            Err(NoteError::UnexpectedChar(c)) if c.is_ascii_alphabetic() => Err(TokenizationError::AmbiguousLetter {
                word: word.to_string(),
                offset,
            }),
            Err(reason) => Err(malformed(reason)),
        },
        'r' => {
            let rest = &word[1..];
            if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return Err(unknown());
            }
            parse_suffix(rest).map(TokenKind::Rest).map_err(malformed)
        }
        '0'..='9' => parse_suffix(word).map(TokenKind::Duration).map_err(malformed),
        '|' if word == "|" => Ok(TokenKind::BarSeparator),
        '\\' | '~' | '(' | ')' | '-' | '^' | '_' => match parse_post_events(word) {
            Ok(events) => Ok(TokenKind::PostEvent(events)),
            Err(NoteError::UnknownCommand(_)) => Err(unknown()),
            Err(reason) => Err(malformed(reason)),
        },
        _ => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::expand::expand;

    fn kinds(line: &str) -> Vec<TokenKind> {
        tokenize(&expand(line).unwrap())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn error(line: &str) -> TokenizationError {
        tokenize(&expand(line).unwrap()).unwrap_err()
    }

    #[test]
    fn test_notes_and_rests() {
        let tokens = kinds("c4 r8 d");
        assert_eq!(tokens.len(), 3);
        assert!(matches!(tokens[0], TokenKind::Note(_)));
        assert!(matches!(tokens[1], TokenKind::Rest(_)));
        assert!(matches!(tokens[2], TokenKind::Note(_)));
    }

    #[test]
    fn test_chord_brackets_split_from_notes() {
        let tokens = kinds("<c e g>4.");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], TokenKind::ChordStart);
        match &tokens[4] {
            TokenKind::ChordEnd(suffix) => assert_eq!(suffix.length.map(|l| l.dots), Some(1)),
            other => panic!("expected chord end, got {:?}", other),
        }
    }

    #[test]
    fn test_crescendo_is_not_a_chord_end() {
        let tokens = kinds("c4\\< d4-> e4\\>");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_tuplet_directive_and_glued_braces() {
        let tokens = kinds("\\tuplet 3/2 {c8 d e}");
        assert_eq!(tokens[0], TokenKind::Tuplet { actual: 3, normal: 2 });
        assert_eq!(tokens[1], TokenKind::GroupOpen);
        assert_eq!(tokens[5], TokenKind::GroupClose);
        assert_eq!(kinds("\\times 2/3 { c8 }")[0], TokenKind::Tuplet { actual: 3, normal: 2 });
    }

    #[test]
    fn test_brace_glued_to_tuplet_ratio() {
        let tokens = kinds("\\tuplet 3/2{ c8 d e }");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], TokenKind::Tuplet { actual: 3, normal: 2 });
        assert_eq!(tokens[1], TokenKind::GroupOpen);
        assert_eq!(tokens[5], TokenKind::GroupClose);
        assert_eq!(kinds("\\tup 3/2{ c8 d e}").len(), 6);
    }

    #[test]
    fn test_control_directives() {
        assert_eq!(kinds("\\ottava #1")[0], TokenKind::Ottava(1));
        assert_eq!(kinds("\\ott -1")[0], TokenKind::Ottava(-1));
        assert_eq!(kinds("\\time 3/4")[0], TokenKind::Time(Meter::new(3, 4).unwrap()));
        match &kinds("\\tempo 4. = 60 c2.")[..] {
            [TokenKind::Tempo(tempo), TokenKind::Note(_)] => {
                assert!(tempo.dotted);
                assert_eq!(tempo.bpm, 60);
            }
            other => panic!("unexpected tokens {:?}", other),
        }
    }

    #[test]
    fn test_keywords_are_not_notes() {
        assert_eq!(kinds("bass c4")[0], TokenKind::Clef(Clef::Bass));
        assert_eq!(kinds("\\clef alto")[0], TokenKind::Clef(Clef::Alto));
    }

    #[test]
    fn test_free_standing_post_events_and_durations() {
        let tokens = kinds("8. \\f ~ |");
        assert!(matches!(tokens[0], TokenKind::Duration(_)));
        assert!(matches!(tokens[1], TokenKind::PostEvent(_)));
        assert_eq!(tokens[2], TokenKind::PostEvent(vec![PostEvent::Tie]));
        assert_eq!(tokens[3], TokenKind::BarSeparator);
    }

    #[test]
    fn test_quoted_text_keeps_spaces() {
        let tokens = tokenize(&expand("c4^\"molto rit.\" d4").unwrap()).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].position, 16);
    }

    #[test]
    fn test_origin_survives_expansion() {
        let tokens = tokenize(&expand("[c8 d]2 e4").unwrap()).unwrap();
        assert_eq!(tokens[2].origin, 1);
        assert_eq!(tokens[4].origin, 8);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(error("cello"), TokenizationError::AmbiguousLetter { offset: 0, .. }));
        assert!(matches!(error("c4 ^\"open"), TokenizationError::UnterminatedQuote { offset: 4 }));
        assert!(matches!(error("<c e"), TokenizationError::UnterminatedChord { offset: 0 }));
        assert!(matches!(error("<c <e>"), TokenizationError::NestedChord { offset: 3 }));
        assert!(matches!(error("c e>4"), TokenizationError::StrayChordEnd { offset: 3 }));
        assert!(matches!(error("\\tuplet x"), TokenizationError::MalformedDirective { .. }));
        assert!(matches!(error("\\ottava 5"), TokenizationError::MalformedDirective { .. }));
        assert!(matches!(error("x4"), TokenizationError::UnknownWord { .. }));
        assert!(matches!(error("\\loud"), TokenizationError::UnknownWord { .. }));
        assert!(matches!(error("c3"), TokenizationError::Malformed { .. }));
    }
}
