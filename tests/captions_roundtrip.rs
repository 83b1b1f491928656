//! Caption sidecar round-trip through the documented record format.

use clipforge::render::{build_sidecar, parse_sidecar};
use clipforge::transcribe::SpeechSegment;

fn speech(start: f64, end: f64, text: &str) -> SpeechSegment {
    SpeechSegment {
        start,
        end,
        text: text.to_string(),
        confidence: 0.85,
        language: "en".to_string(),
    }
}

#[test]
fn sidecar_round_trips_to_the_producing_segments() {
    let segments = vec![
        speech(120.0, 123.456, "The first thing nobody tells you."),
        speech(124.0, 128.75, "Compound interest is quiet."),
        speech(129.1, 133.0, "And then it isn't."),
    ];

    let sidecar = build_sidecar(&segments, 120.0, 140.0);
    let parsed = parse_sidecar(&sidecar).expect("sidecar parses back");

    assert_eq!(parsed.len(), segments.len());
    for (original, roundtrip) in segments.iter().zip(&parsed) {
        // Timestamps survive up to millisecond rounding, re-based to the
        // clip start.
        assert!((roundtrip.start - (original.start - 120.0)).abs() < 1e-3);
        assert!((roundtrip.end - (original.end - 120.0)).abs() < 1e-3);
        assert_eq!(roundtrip.text, original.text);
    }
}

#[test]
fn sidecar_records_are_one_indexed_and_blank_terminated() {
    let segments = vec![speech(0.0, 2.0, "one"), speech(3.0, 5.0, "two")];
    let sidecar = build_sidecar(&segments, 0.0, 10.0);

    let blocks: Vec<&str> = sidecar.trim_end().split("\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("1\n"));
    assert!(blocks[1].starts_with("2\n"));
    assert!(sidecar.ends_with("\n\n"));
    assert!(blocks[0].contains("00:00:00,000 --> 00:00:02,000"));
}

#[test]
fn multi_line_text_survives_the_round_trip() {
    let sidecar = "1\n00:00:01,000 --> 00:00:03,500\nfirst line\nsecond line\n\n";
    let parsed = parse_sidecar(sidecar).expect("parses");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].text, "first line\nsecond line");
    assert!((parsed[0].start - 1.0).abs() < 1e-9);
    assert!((parsed[0].end - 3.5).abs() < 1e-9);
}
