//! End-to-end tests for turning one typed line into a melodic line
//!
//! Each test goes through expansion, tokenizing and event building the way
//! the score does when a user edits a bar.

use notation_wasm::models::{Instrument, InstrumentState, Meter, Tempo};
use notation_wasm::parse::{parse_bars, parse_line, BarContext, MacroCursor};

fn context() -> BarContext {
    BarContext {
        meter: Meter::default(),
        tempo: Tempo::default(),
    }
}

fn durations(text: &str) -> Vec<u32> {
    let built = parse_line(text, &Instrument::new("oboe"), &InstrumentState::default(), context())
        .unwrap_or_else(|e| panic!("'{}' failed: {}", text, e));
    built.line.events.iter().map(|e| e.duration).collect()
}

#[test]
fn test_repeats_expand_before_building() {
    assert_eq!(durations("[c'8 d']2 e'4*2"), vec![32, 32, 32, 32, 64, 64]);
    assert_eq!(durations("<c' e' g'>8*2 r4 r2"), vec![32, 32, 64, 128]);
}

#[test]
fn test_triplet_in_a_full_bar() {
    assert_eq!(durations("\\tuplet 3/2 { c'8 d' e' } f'4 g'2"), vec![22, 21, 21, 64, 128]);
    assert_eq!(durations("\\tuplet 3/2{ c'8 d' e' } f'4 g'2"), vec![22, 21, 21, 64, 128]);
}

#[test]
fn test_errors_point_into_the_typed_line() {
    let oboe = Instrument::new("oboe");
    let err = parse_line("[c'4]2 d'4) e'2", &oboe, &InstrumentState::default(), context()).unwrap_err();
    assert_eq!(err.kind(), "slur_orphan_end");
    assert_eq!(err.offset(), 7);

    let err = parse_line("[c' d'", &oboe, &InstrumentState::default(), context()).unwrap_err();
    assert_eq!(err.kind(), "unbalanced_open");
    assert_eq!(err.offset(), 0);
}

#[test]
fn test_dynamics_follow_the_ramp() {
    let built = parse_line(
        "c'8\\p\\< d' e' f' g'\\f r4.",
        &Instrument::new("oboe"),
        &InstrumentState::default(),
        context(),
    )
    .unwrap();

    let levels: Vec<u8> = built.line.events.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![2, 3, 4, 4, 5, 5]);
    assert_eq!(built.line.ramps.len(), 1);
    assert_eq!(built.line.closing.level, 5);
}

#[test]
fn test_transposing_instrument_keeps_written_staff_position() {
    let clarinet = Instrument::new("clarinet").with_transposition(-2);
    let built = parse_line("d'1", &clarinet, &InstrumentState::default(), context()).unwrap();
    let pitch = &built.line.events[0].content.pitches()[0];
    assert_eq!(pitch.natural, 8);
    assert_eq!(pitch.sounding, 60.0);
}

#[test]
fn test_rhythm_instrument_takes_bare_durations() {
    let snare = Instrument::new("snare").rhythm();
    let built = parse_line("4 8 8 2", &snare, &InstrumentState::default(), context()).unwrap();
    assert_eq!(built.line.len(), 4);
    assert!(built.line.rhythm);
}

#[test]
fn test_multi_bar_declaration_threads_state() {
    let oboe = Instrument::new("oboe");
    let mut cursor = MacroCursor::new(0, InstrumentState::default(), context());

    let bars = parse_bars("\\bars [c'4]4 | d'2 e'( | f'1)", &oboe, &mut cursor).unwrap();
    assert_eq!(bars.len(), 3);
    assert_eq!(cursor.position, 3);
    assert!(bars.iter().all(|bar| bar.line.total_duration() == 256));
    assert_eq!(bars[1].line.closing.open_slurs, 1);
    assert_eq!(bars[2].line.slurs[0].start, None);
    assert_eq!(cursor.state.open_slurs, 0);
}

#[test]
fn test_failed_declaration_leaves_cursor() {
    let oboe = Instrument::new("oboe");
    let mut cursor = MacroCursor::new(4, InstrumentState::default(), context());
    assert!(parse_bars("\\bars c'1 | d'2", &oboe, &mut cursor).is_err());
    assert_eq!(cursor.position, 4);
}
