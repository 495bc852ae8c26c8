//! Canonical serialization.
//!
//! Rules:
//!   - `null` and the absent marker both encode to `null`
//!   - numbers use the shortest round-trip decimal form (`1.0 -> 1`, `1e21 -> 1e+21`)
//!   - strings are JSON-quoted
//!   - lists keep their order
//!   - map keys are emitted in ascending byte order; absent values are omitted
//!   - no whitespace anywhere

use std::collections::BTreeMap;
use std::fmt::Write as _;

use wel_types::{CanonicalError, RawValue, Value};

/// A value with a unique canonical string form.
pub trait Canonicalize {
    /// Append the canonical form of `self` to `out`.
    fn write_canonical(&self, out: &mut String) -> Result<(), CanonicalError>;
}

/// Canonical string form of a value.
pub fn canonicalize<T: Canonicalize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    let mut out = String::new();
    value.write_canonical(&mut out)?;
    Ok(out)
}

/// Canonical form of an already-validated value. Cannot fail.
pub fn canonical_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

impl Canonicalize for Value {
    fn write_canonical(&self, out: &mut String) -> Result<(), CanonicalError> {
        write_value(self, out);
        Ok(())
    }
}

impl Canonicalize for RawValue {
    fn write_canonical(&self, out: &mut String) -> Result<(), CanonicalError> {
        if let Some(err) = self.rejection() {
            return Err(err);
        }
        match self {
            RawValue::Absent | RawValue::Null => out.push_str("null"),
            RawValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            RawValue::Number(n) => write_number(*n, out),
            RawValue::String(s) => write_string(s, out),
            RawValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out)?;
                }
                out.push(']');
            }
            RawValue::Map(pairs) => {
                // Later writes to the same key win.
                let latest: BTreeMap<&str, &RawValue> =
                    pairs.iter().map(|(k, v)| (k.as_str(), v)).collect();
                out.push('{');
                let mut first = true;
                for (key, value) in latest {
                    if value.is_absent() {
                        continue;
                    }
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    write_string(key, out);
                    out.push(':');
                    value.write_canonical(out)?;
                }
                out.push('}');
            }
            RawValue::Foreign(kind) => return Err(CanonicalError::UnsupportedType(*kind)),
            RawValue::Instance { class_name, .. } => {
                return Err(CanonicalError::NotPlainValue(class_name.clone()))
            }
        }
        Ok(())
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n.as_f64(), out),
        Value::String(s) => write_string(s, out),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// JSON string literal with the minimal escape set.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Shortest round-trip decimal form of a finite number, laid out the way
/// ECMAScript `Number.prototype.toString` does: plain notation for decimal
/// exponents in `[-6, 21)`, scientific notation with an explicit exponent
/// sign outside it.
fn write_number(n: f64, out: &mut String) {
    debug_assert!(n.is_finite());
    if n == 0.0 {
        out.push('0');
        return;
    }
    if n < 0.0 {
        out.push('-');
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. `1.2345e3`.
    let sci = format!("{:e}", n.abs());
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        out.push_str(&sci);
        return;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exponent + 1;

    if k <= point && point <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((point - k) as usize));
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-point) as usize));
        out.push_str(&digits);
    } else {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = point - 1;
        let _ = write!(out, "e{}{}", if e < 0 { '-' } else { '+' }, e.abs());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use proptest::prelude::*;
    use wel_types::ForeignKind;

    use super::*;

    fn canon(value: impl Into<RawValue>) -> String {
        canonicalize(&value.into()).unwrap()
    }

    #[test]
    fn primitives() {
        assert_eq!(canon(RawValue::Absent), "null");
        assert_eq!(canon(RawValue::Null), "null");
        assert_eq!(canon(true), "true");
        assert_eq!(canon(false), "false");
        assert_eq!(canon(5), "5");
        assert_eq!(canon("x"), "\"x\"");
    }

    #[test]
    fn numbers_use_shortest_decimal_form() {
        assert_eq!(canon(1.0), "1");
        assert_eq!(canon(-0.0), "0");
        assert_eq!(canon(0.5), "0.5");
        assert_eq!(canon(-1.5), "-1.5");
        assert_eq!(canon(100.0), "100");
        assert_eq!(canon(0.1), "0.1");
        assert_eq!(canon(1234.5678), "1234.5678");
        assert_eq!(canon(0.000001), "0.000001");
        assert_eq!(canon(1e-7), "1e-7");
        assert_eq!(canon(1.5e-9), "1.5e-9");
        assert_eq!(canon(1e21), "1e+21");
        assert_eq!(canon(1.5e300), "1.5e+300");
        assert_eq!(canon(123456789012345680000.0), "123456789012345680000");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(canon("a\"b"), r#""a\"b""#);
        assert_eq!(canon("back\\slash"), r#""back\\slash""#);
        assert_eq!(canon("line\nbreak\ttab"), r#""line\nbreak\ttab""#);
        assert_eq!(canon("\u{1f}"), r#""\u001f""#);
        assert_eq!(canon("héllo ✓"), "\"héllo ✓\"");
    }

    #[test]
    fn map_key_order_does_not_matter() {
        let a = RawValue::map().with("a", 1).with("b", 2);
        let b = RawValue::map().with("b", 2).with("a", 1);
        assert_eq!(canon(a.clone()), canon(b));
        assert_eq!(canon(a), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn list_order_matters() {
        let xy = RawValue::from(vec!["x", "y"]);
        let yx = RawValue::from(vec!["y", "x"]);
        assert_ne!(canon(xy.clone()), canon(yx));
        assert_eq!(canon(xy), r#"["x","y"]"#);
    }

    #[test]
    fn absent_keys_are_omitted() {
        let with_absent = RawValue::map().with("a", 1).with("b", RawValue::Absent);
        let without = RawValue::map().with("a", 1);
        assert_eq!(canon(with_absent), canon(without));
    }

    #[test]
    fn absent_list_elements_encode_as_null() {
        let list = RawValue::List(vec![RawValue::Absent, RawValue::from(1)]);
        assert_eq!(canon(list), "[null,1]");
    }

    #[test]
    fn raw_and_validated_forms_agree() {
        let raw = RawValue::map()
            .with("z", vec![1.5, 2.0])
            .with("a", RawValue::map().with("nested", "v").with("gone", RawValue::Absent))
            .with("m", RawValue::Null);
        let expected = canon(raw.clone());
        let value = raw.into_value().unwrap();
        assert_eq!(canonical_value(&value), expected);
        assert_eq!(expected, r#"{"a":{"nested":"v"},"m":null,"z":[1.5,2]}"#);
    }

    #[test]
    fn rejects_date_time() {
        let err = canonicalize(&RawValue::from(chrono::Utc::now())).unwrap_err();
        assert_eq!(err, CanonicalError::UnsupportedType(ForeignKind::DateTime));
        assert!(err.to_string().contains("date-time"));
    }

    #[test]
    fn rejects_hash_containers() {
        let map: HashMap<String, i32> = HashMap::new();
        let set: HashSet<String> = HashSet::new();
        assert_eq!(
            canonicalize(&RawValue::from(map)).unwrap_err(),
            CanonicalError::UnsupportedType(ForeignKind::HashMap)
        );
        assert_eq!(
            canonicalize(&RawValue::from(set)).unwrap_err(),
            CanonicalError::UnsupportedType(ForeignKind::HashSet)
        );
    }

    #[test]
    fn rejects_non_finite_numbers() {
        assert_eq!(
            canonicalize(&RawValue::from(f64::NAN)).unwrap_err(),
            CanonicalError::InvalidValue("NaN".into())
        );
        assert_eq!(
            canonicalize(&RawValue::from(f64::INFINITY)).unwrap_err(),
            CanonicalError::InvalidValue("Infinity".into())
        );
    }

    #[test]
    fn rejects_symbols_and_functions() {
        let symbol = canonicalize(&RawValue::Foreign(ForeignKind::Symbol)).unwrap_err();
        let function = canonicalize(&RawValue::Foreign(ForeignKind::Function)).unwrap_err();
        assert_eq!(symbol, CanonicalError::UnsupportedType(ForeignKind::Symbol));
        assert_eq!(function, CanonicalError::UnsupportedType(ForeignKind::Function));
        assert_ne!(symbol.to_string(), function.to_string());
    }

    #[test]
    fn rejects_instances() {
        let obj = RawValue::Instance {
            class_name: "Ctor".into(),
            fields: vec![("x".into(), RawValue::from(1))],
        };
        assert_eq!(
            canonicalize(&obj).unwrap_err(),
            CanonicalError::NotPlainValue("Ctor".into())
        );
    }

    #[test]
    fn rejection_inside_nested_structure_propagates() {
        let raw = RawValue::map().with("list", RawValue::List(vec![RawValue::from(f64::NAN)]));
        assert!(matches!(
            canonicalize(&raw),
            Err(CanonicalError::InvalidValue(_))
        ));
    }

    proptest! {
        #[test]
        fn integers_match_decimal_text(n in any::<i32>()) {
            prop_assert_eq!(canon(n), n.to_string());
        }

        #[test]
        fn finite_numbers_round_trip(n in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let text = canon(n);
            let parsed: f64 = text.parse().unwrap();
            prop_assert_eq!(parsed, if n == 0.0 { 0.0 } else { n });
        }

        #[test]
        fn insertion_order_is_irrelevant(
            pairs in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..12)
        ) {
            let forward = RawValue::object(pairs.clone());
            let reversed = RawValue::object(pairs.into_iter().rev().collect::<Vec<_>>());
            prop_assert_eq!(canon(forward), canon(reversed));
        }
    }
}
