use super::*;

#[test]
fn approximate_extent_uses_widest_line() {
    let s = approximate_extent("Hello\nWorld!!", 20.0);
    assert!((s.width - 7.0 * 20.0 * APPROX_ADVANCE_EM).abs() < 1e-9);
    assert!((s.height - 2.0 * 20.0 * APPROX_LINE_HEIGHT_EM).abs() < 1e-9);
}

#[test]
fn approximate_extent_counts_chars_not_bytes() {
    let ascii = approximate_extent("abcd", 10.0);
    let accented = approximate_extent("àéîõ", 10.0);
    assert_eq!(ascii, accented);
}

#[test]
fn empty_text_keeps_one_line() {
    let s = approximate_extent("", 10.0);
    assert_eq!(s.width, 1.0);
    assert!((s.height - 12.0).abs() < 1e-9);
}

#[test]
fn family_names_fall_back_to_fixed_metric() {
    let m = ParleyMeasurer;
    let by_family = m.measure("Title", FontSource::Family("Inter"), 32.0).unwrap();
    let default = m.measure("Title", FontSource::Default, 32.0).unwrap();
    assert_eq!(by_family, default);
    assert_eq!(by_family, approximate_extent("Title", 32.0));
}

#[test]
fn rejects_bad_sizes_and_fontless_bytes() {
    let m = ParleyMeasurer;
    assert!(m.measure("x", FontSource::Default, 0.0).is_err());
    assert!(m.measure("x", FontSource::Default, f32::NAN).is_err());
    assert!(m.measure("x", FontSource::Bytes(b"not a font"), 12.0).is_err());
}
