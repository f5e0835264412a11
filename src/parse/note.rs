//! Note-word grammar
//!
//! A note word is
//!
//! ```text
//! letter  accidentals{0,2}  octave-marks*  '!'?  digits?  dots*  post-events*
//! ```
//!
//! Rests (`r`), chord ends (`>`) and bare durations share the trailing
//! `digits? dots* post-events*` part, parsed by [`parse_suffix`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::duration::digit_value;
use crate::models::{AccidentalMark, Annotation, Articulation, Dynamic, NoteLength, Placement, RampDirection};

#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum NoteError {
    #[error("unexpected '{0}'")]
    UnexpectedChar(char),
    #[error("more than two accidental suffixes")]
    TooManyAccidentals,
    #[error("'{0}' is not a duration (use 1, 2, 4 ... 128)")]
    BadDuration(String),
    #[error("dot without a duration")]
    DotWithoutDuration,
    #[error("unknown command '\\{0}'")]
    UnknownCommand(String),
    #[error("unterminated text")]
    UnterminatedText,
    #[error("'{0}' is not an articulation")]
    UnknownArticulation(char),
    #[error("missing note letter")]
    MissingLetter,
}

/// Things that can follow a note and attach to its slot
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum PostEvent {
    Tie,
    SlurOpen,
    SlurClose,
    Dynamic(Dynamic),
    RampStart(RampDirection),
    RampStop,
    Articulation(Articulation),
    Text(Annotation),
    Glissando,
}

/// Optional length plus post-events trailing a note, rest or chord
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Suffix {
    pub length: Option<NoteLength>,
    pub post: Vec<PostEvent>,
}

/// A fully parsed note word
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteWord {
    pub step: i8,
    /// Quarter-tones (+2 = sharp)
    pub alteration: i8,
    pub octave: i8,
    pub mark: AccidentalMark,
    pub suffix: Suffix,
}

/// Parse a note word such as `cis''!8.~`
pub fn parse_note_word(word: &str) -> Result<NoteWord, NoteError> {
    let letter = word.chars().next().ok_or(NoteError::MissingLetter)?;
    let step = match letter {
        'c' => 0,
        'd' => 1,
        'e' => 2,
        'f' => 3,
        'g' => 4,
        'a' => 5,
        'b' => 6,
        _ => return Err(NoteError::MissingLetter),
    };

    let mut rest = &word[letter.len_utf8()..];
    let mut alteration = 0i8;
    let mut suffixes = 0;

    // Dutch shorthand: "as" and "es" are a-flat and e-flat
    if matches!(letter, 'a' | 'e') && rest.starts_with('s') {
        let after = &rest[1..];
        if !after.starts_with(|c: char| c.is_ascii_alphabetic()) || after.starts_with("es") {
            alteration -= 2;
            suffixes += 1;
            rest = after;
        }
    }

    loop {
        let delta = if rest.starts_with("is") {
            2
        } else if rest.starts_with("es") {
            -2
        } else if rest.starts_with("ih") {
            1
        } else if rest.starts_with("eh") {
            -1
        } else {
            break;
        };
        suffixes += 1;
        if suffixes > 2 {
            return Err(NoteError::TooManyAccidentals);
        }
        alteration += delta;
        rest = &rest[2..];
    }

    let mut octave = 0i8;
    while let Some(c) = rest.chars().next() {
        match c {
            '\'' => octave = octave.saturating_add(1),
            ',' => octave = octave.saturating_sub(1),
            _ => break,
        }
        rest = &rest[1..];
    }

    let mut mark = if suffixes > 0 {
        AccidentalMark::Explicit
    } else {
        AccidentalMark::Default
    };
    if let Some(after) = rest.strip_prefix('!') {
        mark = AccidentalMark::Forced;
        rest = after;
    }

    if let Some(c) = rest.chars().next() {
        if c.is_ascii_alphabetic() {
            return Err(NoteError::UnexpectedChar(c));
        }
    }

    let suffix = parse_suffix(rest)?;
    Ok(NoteWord {
        step,
        alteration,
        octave,
        mark,
        suffix,
    })
}

/// Parse `digits? dots* post-events*`
pub fn parse_suffix(text: &str) -> Result<Suffix, NoteError> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    let mut rest = &text[digits.len()..];

    let dots = rest.chars().take_while(|&c| c == '.').count();
    rest = &rest[dots..];

    let length = if digits.is_empty() {
        if dots > 0 {
            return Err(NoteError::DotWithoutDuration);
        }
        None
    } else {
        let base = digits
            .parse::<u32>()
            .ok()
            .and_then(digit_value)
            .ok_or_else(|| NoteError::BadDuration(digits.clone()))?;
        Some(NoteLength::new(base, dots.min(u8::MAX as usize) as u8))
    };

    Ok(Suffix {
        length,
        post: parse_post_events(rest)?,
    })
}

/// Parse a run of post-events such as `~(\f-.`
pub fn parse_post_events(text: &str) -> Result<Vec<PostEvent>, NoteError> {
    let mut events = Vec::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        let event = match c {
            '~' => PostEvent::Tie,
            '(' => PostEvent::SlurOpen,
            ')' => PostEvent::SlurClose,
            '\\' => {
                let (event, remaining) = parse_command(rest)?;
                rest = remaining;
                event
            }
            '-' | '^' | '_' => {
                let next = rest.chars().next().ok_or(NoteError::UnexpectedChar(c))?;
                if next == '"' {
                    let (text, remaining) = read_quoted(&rest[1..])?;
                    rest = remaining;
                    let placement = if c == '_' { Placement::Below } else { Placement::Above };
                    PostEvent::Text(Annotation { text, placement })
                } else {
                    rest = &rest[next.len_utf8()..];
                    let articulation = Articulation::from_symbol(next).ok_or(NoteError::UnknownArticulation(next))?;
                    PostEvent::Articulation(articulation)
                }
            }
            other => return Err(NoteError::UnexpectedChar(other)),
        };
        events.push(event);
    }

    Ok(events)
}

/// Parse what follows a backslash: `<`, `>`, `!`, a dynamic or `glissando`
fn parse_command(text: &str) -> Result<(PostEvent, &str), NoteError> {
    match text.chars().next() {
        Some('<') => return Ok((PostEvent::RampStart(RampDirection::Crescendo), &text[1..])),
        Some('>') => return Ok((PostEvent::RampStart(RampDirection::Diminuendo), &text[1..])),
        Some('!') => return Ok((PostEvent::RampStop, &text[1..])),
        _ => {}
    }

    let name_len = text.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let (name, rest) = text.split_at(name_len);
    match name {
        "glissando" | "gliss" => Ok((PostEvent::Glissando, rest)),
        "cresc" => Ok((PostEvent::RampStart(RampDirection::Crescendo), rest)),
        "dim" | "decresc" => Ok((PostEvent::RampStart(RampDirection::Diminuendo), rest)),
        _ => Dynamic::from_name(name)
            .map(|dynamic| (PostEvent::Dynamic(dynamic), rest))
            .ok_or_else(|| NoteError::UnknownCommand(name.to_string())),
    }
}

/// Read up to the closing quote; returns (contents, remainder after quote)
fn read_quoted(text: &str) -> Result<(String, &str), NoteError> {
    let end = text.find('"').ok_or(NoteError::UnterminatedText)?;
    Ok((text[..end].to_string(), &text[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_note() {
        let note = parse_note_word("c4").unwrap();
        assert_eq!(note.step, 0);
        assert_eq!(note.alteration, 0);
        assert_eq!(note.octave, 0);
        assert_eq!(note.mark, AccidentalMark::Default);
        assert_eq!(note.suffix.length, Some(NoteLength::new(64, 0)));
    }

    #[test]
    fn test_accidental_suffixes() {
        assert_eq!(parse_note_word("cis").unwrap().alteration, 2);
        assert_eq!(parse_note_word("fisis").unwrap().alteration, 4);
        assert_eq!(parse_note_word("beh").unwrap().alteration, -1);
        assert_eq!(parse_note_word("fisih").unwrap().alteration, 3);
        assert_eq!(parse_note_word("es").unwrap().alteration, -2);
        assert_eq!(parse_note_word("ees").unwrap().alteration, -2);
        assert_eq!(parse_note_word("as").unwrap().alteration, -2);
        assert_eq!(parse_note_word("ases").unwrap().alteration, -4);
        assert_eq!(parse_note_word("cisisis"), Err(NoteError::TooManyAccidentals));
        assert_eq!(parse_note_word("cis").unwrap().mark, AccidentalMark::Explicit);
    }

    #[test]
    fn test_octaves_and_force() {
        let note = parse_note_word("g,,!2.").unwrap();
        assert_eq!(note.octave, -2);
        assert_eq!(note.mark, AccidentalMark::Forced);
        assert_eq!(note.suffix.length, Some(NoteLength::new(128, 1)));
        assert_eq!(parse_note_word("a''").unwrap().octave, 2);
    }

    #[test]
    fn test_post_events() {
        let note = parse_note_word("d8~(\\f->^\"dolce\"").unwrap();
        assert_eq!(
            note.suffix.post,
            vec![
                PostEvent::Tie,
                PostEvent::SlurOpen,
                PostEvent::Dynamic(Dynamic::from_name("f").unwrap()),
                PostEvent::Articulation(Articulation::Accent),
                PostEvent::Text(Annotation {
                    text: "dolce".to_string(),
                    placement: Placement::Above,
                }),
            ]
        );
    }

    #[test]
    fn test_ramps() {
        assert_eq!(
            parse_post_events("\\<").unwrap(),
            vec![PostEvent::RampStart(RampDirection::Crescendo)]
        );
        assert_eq!(parse_post_events("\\!)").unwrap(), vec![PostEvent::RampStop, PostEvent::SlurClose]);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_note_word("cello"), Err(NoteError::UnexpectedChar('e')));
        assert_eq!(parse_note_word("c3"), Err(NoteError::BadDuration("3".to_string())));
        assert_eq!(parse_note_word("c."), Err(NoteError::DotWithoutDuration));
        assert_eq!(parse_post_events("\\loud"), Err(NoteError::UnknownCommand("loud".to_string())));
        assert_eq!(parse_post_events("-?"), Err(NoteError::UnknownArticulation('?')));
        assert_eq!(parse_post_events("^\"open"), Err(NoteError::UnterminatedText));
    }
}
