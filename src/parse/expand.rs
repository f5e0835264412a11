//! Repetition expansion
//!
//! Rewrites the three repetition shorthands into plain notation before
//! tokenizing:
//! - `[c d]2` or `[c d]*2` → `c d c d` (innermost group first)
//! - `<c e>8*3` → `<c e>8 <c e>8 <c e>8` (angle brackets are kept)
//! - `c4*3` → `c4 c4 c4`
//!
//! Every output byte remembers the byte offset it came from in the original
//! line, so errors found after expansion can still point at what the user
//! typed. Quoted text is never expanded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted repeat count
pub const MAX_REPEAT: u32 = 256;

/// Largest expanded line, in characters; nested repeats multiply
pub const MAX_EXPANDED_LEN: usize = 65_536;

#[derive(Error, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpansionErrorKind {
    #[error("'[' without matching ']'")]
    UnbalancedOpen,
    #[error("']' without matching '['")]
    UnbalancedClose,
    #[error("repeat group is missing its count")]
    MissingCount,
    #[error("repeat count must be at least 1")]
    ZeroCount,
    #[error("repeat count is larger than 256")]
    CountTooLarge,
    #[error("nothing to repeat")]
    EmptyGroup,
    #[error("expanded line is too long")]
    TooLong,
}

impl ExpansionErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ExpansionErrorKind::UnbalancedOpen => "unbalanced_open",
            ExpansionErrorKind::UnbalancedClose => "unbalanced_close",
            ExpansionErrorKind::MissingCount => "missing_count",
            ExpansionErrorKind::ZeroCount => "zero_count",
            ExpansionErrorKind::CountTooLarge => "count_too_large",
            ExpansionErrorKind::EmptyGroup => "empty_group",
            ExpansionErrorKind::TooLong => "too_long",
        }
    }
}

/// Expansion failure; `original` is the untouched input line
#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[error("{kind} (offset {offset})")]
pub struct ExpansionError {
    pub kind: ExpansionErrorKind,
    pub offset: usize,
    pub original: String,
}

/// Expanded text plus the original offset of each of its bytes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    pub origins: Vec<usize>,
    pub source_len: usize,
}

impl Expansion {
    /// Offset in the original line of the expanded byte at `index`
    pub fn original_offset(&self, index: usize) -> usize {
        self.origins.get(index).copied().unwrap_or(self.source_len)
    }
}

#[derive(Clone, Copy, Debug)]
struct Sym {
    ch: char,
    origin: usize,
}

const SPACE: char = ' ';

/// Expand all repetition shorthand in `line`
pub fn expand(line: &str) -> Result<Expansion, ExpansionError> {
    let mut syms: Vec<Sym> = line
        .char_indices()
        .map(|(origin, ch)| Sym { ch, origin })
        .collect();

    let fail = |kind, offset| ExpansionError {
        kind,
        offset,
        original: line.to_string(),
    };

    expand_brackets(&mut syms).map_err(|(kind, offset)| fail(kind, offset))?;
    expand_chords(&mut syms).map_err(|(kind, offset)| fail(kind, offset))?;
    expand_tokens(&mut syms).map_err(|(kind, offset)| fail(kind, offset))?;

    let mut text = String::with_capacity(syms.len());
    let mut origins = Vec::with_capacity(syms.len());
    for sym in &syms {
        text.push(sym.ch);
        origins.extend(std::iter::repeat(sym.origin).take(sym.ch.len_utf8()));
    }

    if text != line {
        log::debug!("expanded '{}' → '{}'", line, text);
    }

    Ok(Expansion {
        text,
        origins,
        source_len: line.len(),
    })
}

type PassResult = Result<(), (ExpansionErrorKind, usize)>;

/// Bracket repeats, innermost first; scanning restarts after every splice
fn expand_brackets(syms: &mut Vec<Sym>) -> PassResult {
    'restart: loop {
        let mut stack: Vec<usize> = Vec::new();
        let mut in_quote = false;

        for i in 0..syms.len() {
            match syms[i].ch {
                '"' => in_quote = !in_quote,
                _ if in_quote => {}
                '[' => stack.push(i),
                ']' => {
                    let open = stack.pop().ok_or((ExpansionErrorKind::UnbalancedClose, syms[i].origin))?;
                    let (count, consumed) = read_count(syms, i + 1, syms[i].origin)?;
                    let inner = trim_one_space(&syms[open + 1..i]);
                    if inner.iter().all(|s| s.ch.is_whitespace()) {
                        return Err((ExpansionErrorKind::EmptyGroup, syms[open].origin));
                    }
                    let removed = i + 1 + consumed - open;
                    check_growth(syms.len() - removed, inner.len(), count, syms[i].origin)?;
                    let replacement = repeat_joined(inner, count, syms[i].origin);
                    syms.splice(open..i + 1 + consumed, replacement);
                    continue 'restart;
                }
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            return Err((ExpansionErrorKind::UnbalancedOpen, syms[open].origin));
        }
        return Ok(());
    }
}

/// Chord repeats `<...>X*N`, brackets and suffix `X` kept on every copy
fn expand_chords(syms: &mut Vec<Sym>) -> PassResult {
    let mut i = 0;
    let mut in_quote = false;

    while i < syms.len() {
        let ch = syms[i].ch;
        if ch == '"' {
            in_quote = !in_quote;
        }
        if in_quote || ch != '<' || is_escaped(syms, i) {
            i += 1;
            continue;
        }

        let Some(close) = find_chord_close(syms, i + 1) else {
            // Unterminated chords are reported by the tokenizer
            i += 1;
            continue;
        };

        let word_end = word_end(syms, close + 1);
        let star = syms[close + 1..word_end]
            .iter()
            .rposition(|s| s.ch == '*')
            .map(|p| close + 1 + p);

        match star {
            Some(star) if !in_quotes_at(syms, close + 1, star) => {
                let (count, consumed) = read_count(syms, star + 1, syms[star].origin)?;
                if star + 1 + consumed != word_end {
                    return Err((ExpansionErrorKind::MissingCount, syms[star].origin));
                }
                check_growth(syms.len() - (word_end - i), star - i, count, syms[star].origin)?;
                let chord: Vec<Sym> = syms[i..star].to_vec();
                let replacement = repeat_joined(&chord, count, syms[star].origin);
                let len = replacement.len();
                syms.splice(i..word_end, replacement);
                i += len;
            }
            _ => i = word_end,
        }
    }
    Ok(())
}

/// Bare token repeats `token*N`
fn expand_tokens(syms: &mut Vec<Sym>) -> PassResult {
    let mut i = 0;

    while i < syms.len() {
        if syms[i].ch.is_whitespace() {
            i += 1;
            continue;
        }
        let end = word_end(syms, i);

        // Last unquoted '*' in the word
        let mut star = None;
        let mut in_quote = false;
        for (p, sym) in syms[i..end].iter().enumerate() {
            match sym.ch {
                '"' => in_quote = !in_quote,
                '*' if !in_quote => star = Some(i + p),
                _ => {}
            }
        }

        match star {
            Some(star) => {
                if star == i {
                    return Err((ExpansionErrorKind::EmptyGroup, syms[star].origin));
                }
                let (count, consumed) = read_count(syms, star + 1, syms[star].origin)?;
                if star + 1 + consumed != end {
                    return Err((ExpansionErrorKind::MissingCount, syms[star].origin));
                }
                check_growth(syms.len() - (end - i), star - i, count, syms[star].origin)?;
                let token: Vec<Sym> = syms[i..star].to_vec();
                let replacement = repeat_joined(&token, count, syms[star].origin);
                let len = replacement.len();
                syms.splice(i..end, replacement);
                i += len;
            }
            None => i = end,
        }
    }
    Ok(())
}

/// Read `*`? digits starting at `start`; returns (count, symbols consumed)
fn read_count(syms: &[Sym], start: usize, origin: usize) -> Result<(u32, usize), (ExpansionErrorKind, usize)> {
    let mut pos = start;
    if syms.get(pos).map(|s| s.ch) == Some('*') {
        pos += 1;
    }
    let digits: String = syms[pos.min(syms.len())..]
        .iter()
        .take_while(|s| s.ch.is_ascii_digit())
        .map(|s| s.ch)
        .collect();
    if digits.is_empty() {
        return Err((ExpansionErrorKind::MissingCount, origin));
    }
    let count: u32 = digits
        .parse()
        .map_err(|_| (ExpansionErrorKind::CountTooLarge, origin))?;
    if count == 0 {
        return Err((ExpansionErrorKind::ZeroCount, origin));
    }
    if count > MAX_REPEAT {
        return Err((ExpansionErrorKind::CountTooLarge, origin));
    }
    Ok((count, pos - start + digits.len()))
}

/// Refuse a splice that would push the line past `MAX_EXPANDED_LEN`
fn check_growth(kept: usize, unit: usize, count: u32, origin: usize) -> PassResult {
    let added = (unit + 1) * count as usize - 1;
    if kept + added > MAX_EXPANDED_LEN {
        log::warn!("repeat at offset {} would expand past {} characters", origin, MAX_EXPANDED_LEN);
        return Err((ExpansionErrorKind::TooLong, origin));
    }
    Ok(())
}

fn trim_one_space(inner: &[Sym]) -> &[Sym] {
    let mut inner = inner;
    if inner.first().map(|s| s.ch.is_whitespace()).unwrap_or(false) {
        inner = &inner[1..];
    }
    if inner.last().map(|s| s.ch.is_whitespace()).unwrap_or(false) {
        inner = &inner[..inner.len() - 1];
    }
    inner
}

fn repeat_joined(unit: &[Sym], count: u32, joint_origin: usize) -> Vec<Sym> {
    let mut out = Vec::with_capacity((unit.len() + 1) * count as usize);
    for n in 0..count {
        if n > 0 {
            out.push(Sym {
                ch: SPACE,
                origin: joint_origin,
            });
        }
        out.extend_from_slice(unit);
    }
    out
}

/// `<` or `>` preceded by `\`, `-`, `^` or `_` is a dynamic or articulation
fn is_escaped(syms: &[Sym], index: usize) -> bool {
    index > 0 && matches!(syms[index - 1].ch, '\\' | '-' | '^' | '_')
}

fn find_chord_close(syms: &[Sym], from: usize) -> Option<usize> {
    let mut in_quote = false;
    for i in from..syms.len() {
        match syms[i].ch {
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '<' if !is_escaped(syms, i) => return None,
            '>' if !is_escaped(syms, i) => return Some(i),
            _ => {}
        }
    }
    None
}

/// End of the whitespace-delimited word starting at `start`; quoted
/// stretches are part of the word
fn word_end(syms: &[Sym], start: usize) -> usize {
    let mut in_quote = false;
    let mut i = start;
    while i < syms.len() {
        match syms[i].ch {
            '"' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => break,
            _ => {}
        }
        i += 1;
    }
    i
}

fn in_quotes_at(syms: &[Sym], from: usize, index: usize) -> bool {
    syms[from..index].iter().filter(|s| s.ch == '"').count() % 2 == 1
}
