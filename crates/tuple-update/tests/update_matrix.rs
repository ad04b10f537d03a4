//! Top-level operation semantics: one tuple in, operations applied, exact
//! output bytes compared.

use std::collections::HashMap;

use proptest::prelude::*;
use tuple_pack::Builder;
use tuple_update::{apply_update, apply_upsert, UpdateError};

fn encode<F: FnOnce(&mut Builder)>(f: F) -> Vec<u8> {
    let mut b = Builder::new();
    f(&mut b);
    b.finish()
}

fn update(tuple: &[u8], ops: &[u8]) -> Result<Vec<u8>, UpdateError> {
    apply_update(tuple, ops, 0, &())
}

fn tuple123() -> Vec<u8> {
    encode(|b| {
        b.arr_hdr(3).uint(1).uint(2).uint(3);
    })
}

#[test]
fn empty_batch_is_identity() {
    let tuple = encode(|b| {
        b.arr_hdr(3).uint(1).str("a").bool(true);
    });
    let ops = encode(|b| {
        b.arr_hdr(0);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), tuple);
}

#[test]
fn set_replaces_one_field_verbatim() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").uint(1).str("x");
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(1).str("x").uint(3);
    });
    assert_eq!(update(&tuple123(), &ops).unwrap(), expected);
}

#[test]
fn set_with_one_based_selectors() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").uint(1).uint(99);
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(99).uint(2).uint(3);
    });
    assert_eq!(apply_update(&tuple123(), &ops, 1, &()).unwrap(), expected);
}

#[test]
fn int_encoded_selector_honors_index_base() {
    // Same selector value as above, just carried by an int8 marker.
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").raw(&[0xd0, 0x02]).uint(99);
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(1).uint(99).uint(3);
    });
    assert_eq!(apply_update(&tuple123(), &ops, 1, &()).unwrap(), expected);

    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").raw(&[0xd0, 0x00]).uint(99);
    });
    assert!(matches!(
        apply_update(&tuple123(), &ops, 1, &()),
        Err(UpdateError::NoSuchFieldNo(0))
    ));
}

#[test]
fn negative_selector_counts_from_end() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").int(-1).uint(9);
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(1).uint(2).uint(9);
    });
    assert_eq!(update(&tuple123(), &ops).unwrap(), expected);
}

#[test]
fn insert_before_and_append() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("!").uint(1).uint(9);
    });
    let expected = encode(|b| {
        b.arr_hdr(4).uint(1).uint(9).uint(2).uint(3);
    });
    assert_eq!(update(&tuple123(), &ops).unwrap(), expected);

    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("!").int(-1).uint(4);
    });
    let expected = encode(|b| {
        b.arr_hdr(4).uint(1).uint(2).uint(3).uint(4);
    });
    assert_eq!(update(&tuple123(), &ops).unwrap(), expected);
}

#[test]
fn delete_two_fields_from_middle() {
    let tuple = encode(|b| {
        b.arr_hdr(4).uint(1).uint(2).uint(3).uint(4);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("#").uint(1).uint(2);
    });
    let expected = encode(|b| {
        b.arr_hdr(2).uint(1).uint(4);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn delete_count_clamps_to_tail() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("#").uint(2).uint(100);
    });
    let expected = encode(|b| {
        b.arr_hdr(2).uint(1).uint(2);
    });
    assert_eq!(update(&tuple123(), &ops).unwrap(), expected);
}

#[test]
fn delete_zero_fields_is_an_error() {
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("#").uint(0).uint(0);
    });
    assert!(matches!(
        update(&tuple123(), &ops),
        Err(UpdateError::Field { .. })
    ));
}

#[test]
fn add_crosses_into_unsigned_ceiling() {
    // i64::MAX + 1 still fits the unsigned window.
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(i64::MAX as u64);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("+").uint(0).uint(1);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).uint(i64::MAX as u64 + 1);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn add_overflows_past_u64_max() {
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(u64::MAX);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("+").uint(0).uint(1);
    });
    assert!(matches!(
        update(&tuple, &ops),
        Err(UpdateError::IntegerOverflow { opcode: '+', .. })
    ));
}

#[test]
fn subtract_underflows_past_i64_min() {
    let tuple = encode(|b| {
        b.arr_hdr(1).int(i64::MIN);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("-").uint(0).uint(1);
    });
    assert!(matches!(
        update(&tuple, &ops),
        Err(UpdateError::IntegerOverflow { opcode: '-', .. })
    ));
}

#[test]
fn subtract_below_zero_goes_signed() {
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(0);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("-").uint(0).uint(1);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).int(-1);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn arith_result_takes_lowest_number_kind() {
    // double + int stays double
    let tuple = encode(|b| {
        b.arr_hdr(1).f64(1.5);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("+").uint(0).uint(1);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).f64(2.5);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);

    // float + int narrows back to float
    let tuple = encode(|b| {
        b.arr_hdr(1).f32(1.5);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).f32(2.5);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn arith_on_string_field_is_arg_type_error() {
    let tuple = encode(|b| {
        b.arr_hdr(1).str("abc");
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("+").uint(0).uint(1);
    });
    assert!(matches!(
        update(&tuple, &ops),
        Err(UpdateError::ArgType { opcode: '+', .. })
    ));
}

#[test]
fn bit_ops_fold_against_old_value() {
    let tuple = encode(|b| {
        b.arr_hdr(3).uint(12).uint(12).uint(12);
    });
    let ops = encode(|b| {
        b.arr_hdr(3);
        b.arr_hdr(3).str("&").uint(0).uint(10);
        b.arr_hdr(3).str("|").uint(1).uint(10);
        b.arr_hdr(3).str("^").uint(2).uint(10);
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(8).uint(14).uint(6);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn splice_replaces_middle_of_string() {
    let tuple = encode(|b| {
        b.arr_hdr(1).str("Hello world");
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(5).str(":").uint(0).uint(6).uint(5).str("Earth");
    });
    let expected = encode(|b| {
        b.arr_hdr(1).str("Hello Earth");
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn splice_negative_offset_counts_from_end() {
    // offset -1 is one past the last byte, so -3 starts at byte L - 2.
    let tuple = encode(|b| {
        b.arr_hdr(1).str("abcdef");
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(5).str(":").uint(0).int(-3).uint(2).str("XY");
    });
    let expected = encode(|b| {
        b.arr_hdr(1).str("abcdXY");
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn splice_negative_cut_keeps_tail_suffix() {
    let tuple = encode(|b| {
        b.arr_hdr(1).str("abcdef");
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(5).str(":").uint(0).uint(1).int(-2).str("Z");
    });
    let expected = encode(|b| {
        b.arr_hdr(1).str("aZef");
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn splice_offset_out_of_bound() {
    let tuple = encode(|b| {
        b.arr_hdr(1).str("abcdef");
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(5).str(":").uint(0).int(-8).uint(1).str("x");
    });
    assert!(matches!(
        update(&tuple, &ops),
        Err(UpdateError::Splice { .. })
    ));
}

#[test]
fn disjoint_ops_commute() {
    let ops_ab = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("=").uint(0).str("x");
        b.arr_hdr(3).str("+").uint(2).uint(5);
    });
    let ops_ba = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("+").uint(2).uint(5);
        b.arr_hdr(3).str("=").uint(0).str("x");
    });
    let out_ab = update(&tuple123(), &ops_ab).unwrap();
    let out_ba = update(&tuple123(), &ops_ba).unwrap();
    assert_eq!(out_ab, out_ba);
    let expected = encode(|b| {
        b.arr_hdr(3).str("x").uint(2).uint(8);
    });
    assert_eq!(out_ab, expected);
}

#[test]
fn second_op_on_same_field_is_double_update() {
    let ops = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("=").uint(1).uint(7);
        b.arr_hdr(3).str("+").uint(1).uint(1);
    });
    assert!(matches!(
        update(&tuple123(), &ops),
        Err(UpdateError::DoubleUpdate { .. })
    ));
}

#[test]
fn structural_ops_shift_later_selectors() {
    // Selectors resolve against the tuple as already updated.
    let tuple = encode(|b| {
        b.arr_hdr(2).uint(1).uint(2);
    });
    let ops = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("!").int(-1).uint(9);
        b.arr_hdr(3).str("=").uint(0).uint(5);
    });
    let expected = encode(|b| {
        b.arr_hdr(3).uint(5).uint(2).uint(9);
    });
    assert_eq!(update(&tuple, &ops).unwrap(), expected);
}

#[test]
fn named_selector_resolves_through_dictionary() {
    let mut dict = HashMap::new();
    dict.insert("count".to_string(), 1u32);
    let tuple = encode(|b| {
        b.arr_hdr(2).uint(1).uint(10);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("+").str("count").uint(5);
    });
    let expected = encode(|b| {
        b.arr_hdr(2).uint(1).uint(15);
    });
    assert_eq!(apply_update(&tuple, &ops, 0, &dict).unwrap(), expected);

    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("=").str("missing").uint(5);
    });
    assert!(matches!(
        apply_update(&tuple, &ops, 0, &dict),
        Err(UpdateError::NoSuchFieldName(name)) if name == "missing"
    ));
}

#[test]
fn upsert_skips_ops_failing_on_this_tuple() {
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(1);
    });
    let ops = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("+").uint(0).uint(1);
        b.arr_hdr(3).str("+").uint(5).uint(1);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).uint(2);
    });
    assert_eq!(apply_upsert(&tuple, &ops, 0, &(), true).unwrap(), expected);
    assert!(matches!(
        apply_upsert(&tuple, &ops, 0, &(), false),
        Err(UpdateError::NoSuchFieldNo(5))
    ));
}

#[test]
fn upsert_skips_arg_type_mismatch_mid_batch() {
    let tuple = encode(|b| {
        b.arr_hdr(2).uint(1).str("a");
    });
    let ops = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("+").uint(1).uint(1);
        b.arr_hdr(3).str("=").uint(0).uint(5);
    });
    let expected = encode(|b| {
        b.arr_hdr(2).uint(5).str("a");
    });
    assert_eq!(apply_upsert(&tuple, &ops, 0, &(), true).unwrap(), expected);
}

#[test]
fn upsert_still_rejects_malformed_ops() {
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(1);
    });
    let ops = encode(|b| {
        b.arr_hdr(1).arr_hdr(3).str("?").uint(0).uint(1);
    });
    assert!(matches!(
        apply_upsert(&tuple, &ops, 0, &(), true),
        Err(UpdateError::UnknownUpdateOp)
    ));
}

#[test]
fn upsert_suppresses_double_update() {
    let tuple = encode(|b| {
        b.arr_hdr(1).uint(1);
    });
    let ops = encode(|b| {
        b.arr_hdr(2);
        b.arr_hdr(3).str("=").uint(0).uint(5);
        b.arr_hdr(3).str("=").uint(0).uint(6);
    });
    let expected = encode(|b| {
        b.arr_hdr(1).uint(5);
    });
    assert_eq!(apply_upsert(&tuple, &ops, 0, &(), true).unwrap(), expected);
}

proptest! {
    #[test]
    fn identity_for_any_uint_tuple(vals in proptest::collection::vec(0u64..u64::MAX, 0..16)) {
        let tuple = encode(|b| {
            b.arr_hdr(vals.len() as u32);
            for v in &vals {
                b.uint(*v);
            }
        });
        let ops = encode(|b| {
            b.arr_hdr(0);
        });
        prop_assert_eq!(update(&tuple, &ops).unwrap(), tuple);
    }

    #[test]
    fn single_set_matches_rebuilt_tuple(
        vals in proptest::collection::vec(0u64..1_000_000, 1..16),
        pick in 0usize..16,
        new_val in 0u64..u64::MAX,
    ) {
        let idx = pick % vals.len();
        let tuple = encode(|b| {
            b.arr_hdr(vals.len() as u32);
            for v in &vals {
                b.uint(*v);
            }
        });
        let ops = encode(|b| {
            b.arr_hdr(1).arr_hdr(3).str("=").uint(idx as u64).uint(new_val);
        });
        let expected = encode(|b| {
            b.arr_hdr(vals.len() as u32);
            for (i, v) in vals.iter().enumerate() {
                b.uint(if i == idx { new_val } else { *v });
            }
        });
        prop_assert_eq!(update(&tuple, &ops).unwrap(), expected);
    }

    #[test]
    fn add_matches_checked_model(old in 0u64..u64::MAX, delta in 0u64..u64::MAX) {
        let tuple = encode(|b| {
            b.arr_hdr(1).uint(old);
        });
        let ops = encode(|b| {
            b.arr_hdr(1).arr_hdr(3).str("+").uint(0).uint(delta);
        });
        match old.checked_add(delta) {
            Some(sum) => {
                let expected = encode(|b| {
                    b.arr_hdr(1).uint(sum);
                });
                prop_assert_eq!(update(&tuple, &ops).unwrap(), expected);
            }
            None => {
                let overflows = matches!(
                    update(&tuple, &ops),
                    Err(UpdateError::IntegerOverflow { .. })
                );
                prop_assert!(overflows);
            }
        }
    }
}
