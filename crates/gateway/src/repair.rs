//! Repair for quote-wrapped nested JSON
//!
//! Some venues send a nested object or array as a string without escaping it,
//! e.g. `"data":"[{"a":1}]"`, which is not valid JSON. The first such span has
//! its surrounding quote characters removed; everything else is left
//! byte-identical.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::borrow::Cow;

static QUOTE_WRAPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"("\[|"\{)(.*)(\]"|\}")"#).expect("quote-wrapped JSON pattern is valid")
});

/// Strip the quotes around the first quote-wrapped object/array.
/// Returns the input unchanged when the defect is absent.
pub fn repair_frame(frame: &[u8]) -> Cow<'_, [u8]> {
    let Some(m) = QUOTE_WRAPPED.find(frame) else {
        return Cow::Borrowed(frame);
    };

    let (start, end) = (m.start(), m.end());
    let mut fixed = Vec::with_capacity(frame.len() - 2);
    fixed.extend_from_slice(&frame[..start]);
    fixed.extend_from_slice(&frame[start + 1..end - 1]);
    fixed.extend_from_slice(&frame[end..]);
    Cow::Owned(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_well_formed_frame_is_untouched() {
        let frame = br#"{"channel":"btcusdt_ticker","date":"1540447046542","ticker":{"last":"1.0"}}"#;
        let repaired = repair_frame(frame);
        assert!(matches!(repaired, Cow::Borrowed(_)));
        assert_eq!(repaired.as_ref(), frame.as_slice());
    }

    #[test]
    fn test_array_wrapped_in_quotes() {
        let frame = br#"{"no":"12","data":"[{"id":1},{"id":2}]","code":1000}"#;
        let repaired = repair_frame(frame);
        assert_eq!(
            repaired.as_ref(),
            br#"{"no":"12","data":[{"id":1},{"id":2}],"code":1000}"#.as_slice()
        );
        let value: serde_json::Value = serde_json::from_slice(&repaired).unwrap();
        assert_eq!(value["data"][1]["id"], 2);
    }

    #[test]
    fn test_object_wrapped_in_quotes() {
        let frame = br#"{"data":"{"entrustId":201711133673}","channel":"ltcbtc_order"}"#;
        let repaired = repair_frame(frame);
        assert_eq!(
            repaired.as_ref(),
            br#"{"data":{"entrustId":201711133673},"channel":"ltcbtc_order"}"#.as_slice()
        );
    }

    #[test]
    fn test_only_first_match_is_repaired() {
        // Greedy match spans both wrapped values on one line; only its outer
        // quotes are removed.
        let frame = br#"{"a":"[1]","b":"[2]"}"#;
        let repaired = repair_frame(frame);
        assert_eq!(repaired.as_ref(), br#"{"a":[1]","b":"[2]}"#.as_slice());
    }

    proptest! {
        #[test]
        fn prop_identity_without_defect(s in "[ -~]{0,64}") {
            prop_assume!(!s.contains("\"[") && !s.contains("\"{"));
            let repaired = repair_frame(s.as_bytes());
            prop_assert_eq!(repaired.as_ref(), s.as_bytes());
        }

        #[test]
        fn prop_strips_exactly_the_wrapping_quotes(
            prefix in "[a-z0-9:,{} ]{0,16}",
            body in "[a-z0-9:,{}\\[\\] ]{0,32}",
            suffix in "[a-z0-9:,{} ]{0,16}",
            array in any::<bool>(),
        ) {
            let (open, close) = if array { ('[', ']') } else { ('{', '}') };
            let frame = format!("{prefix}\"{open}{body}{close}\"{suffix}");
            let expected = format!("{prefix}{open}{body}{close}{suffix}");
            let repaired = repair_frame(frame.as_bytes());
            prop_assert_eq!(repaired.as_ref(), expected.as_bytes());
        }
    }
}
