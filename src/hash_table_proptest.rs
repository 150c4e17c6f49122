#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can check the
// directory layout directly.

use crate::hash_funcs::{equal_string, hash_string};
use crate::hash_table::{HashTable, InsertOutcome, MIN_CAPACITY};
use hashbrown::{HashMap, HashSet};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertReturningPrevious(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    // Walk a cursor over the whole table. Bit `n % 8` of `remove_mask`
    // removes the n-th visited entry, bit `n % 8` of `set_mask` overwrites
    // its value through the cursor.
    CursorWalk { remove_mask: u8, set_mask: u8 },
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertReturningPrevious(i, v)),
            4 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (any::<u8>(), any::<u8>())
                .prop_map(|(remove_mask, set_mask)| OpI::CursorWalk { remove_mask, set_mask }),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn check_layout(sut: &HashTable<String, i32>) -> Result<(), TestCaseError> {
    let cap = sut.capacity();
    prop_assert!(cap >= MIN_CAPACITY);
    prop_assert!(cap.is_power_of_two());
    prop_assert!(sut.len() <= cap);
    prop_assert_eq!(sut.occupied_slots(), sut.len());
    Ok(())
}

fn cursor_walk(
    sut: &mut HashTable<String, i32>,
    model: &mut HashMap<String, i32>,
    remove_mask: u8,
    set_mask: u8,
) -> Result<(), TestCaseError> {
    let cap_before = sut.capacity();
    let expected: HashSet<String> = model.keys().cloned().collect();
    let mut seen: HashSet<String> = HashSet::new();

    let c = sut.open_iterator();
    // Failures inside the walk are collected so the cursor is always closed
    // before they propagate.
    let walked = (|| -> Result<(), TestCaseError> {
        let mut n = 0u32;
        loop {
            let Some((k, v)) = sut.advance(&c).map(|(k, v)| (k.clone(), *v)) else {
                break;
            };
            prop_assert!(seen.insert(k.clone()), "cursor revisited {:?}", k);
            prop_assert_eq!(Some(&v), model.get(&k));

            let bit = 1u8 << (n % 8);
            if set_mask & bit != 0 {
                let prev = sut.set_current_value(&c, v.wrapping_add(1));
                prop_assert_eq!(prev, Some(v));
                model.insert(k.clone(), v.wrapping_add(1));
            }
            if remove_mask & bit != 0 {
                // Alternate between cursor-directed and key-directed removal.
                let removed = if n % 2 == 0 {
                    sut.remove_current(&c)
                } else {
                    sut.remove_returning_previous(&k)
                        .map_err(|e| TestCaseError::fail(format!("remove under a cursor: {e}")))?
                };
                let Some((rk, rv)) = removed else {
                    return Err(TestCaseError::fail(format!("visited entry {k:?} is missing")));
                };
                prop_assert_eq!(&rk, &k);
                prop_assert_eq!(Some(rv), model.remove(&k));
                prop_assert_eq!(sut.set_current_value(&c, 0), None);
            }
            n += 1;
        }
        prop_assert!(sut.advance(&c).is_none());
        prop_assert_eq!(sut.capacity(), cap_before);
        Ok(())
    })();
    sut.close_iterator(c);
    walked?;

    prop_assert_eq!(seen, expected);
    Ok(())
}

fn run_scenario(
    mut sut: HashTable<String, i32>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                let outcome = sut.insert(k.clone(), v).expect("insert");
                let expected = if already {
                    InsertOutcome::Updated
                } else {
                    InsertOutcome::Inserted
                };
                prop_assert_eq!(outcome, expected);
                model.insert(k, v);
            }
            OpI::InsertReturningPrevious(i, v) => {
                let k = pool[i].clone();
                let prev = sut.insert_returning_previous(k.clone(), v).expect("insert");
                let model_prev = model.insert(k.clone(), v).map(|old| (k, old));
                prop_assert_eq!(prev, model_prev);
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove_returning_previous(k).expect("remove");
                let model_removed = model.remove(k).map(|v| (k.clone(), v));
                prop_assert_eq!(removed, model_removed);
                prop_assert!(!sut.contains(k));
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains(&s), model.contains_key(&s));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.get_mut(k), model.get_mut(k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.saturating_add(d);
                        *mv = mv.saturating_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m),
                }
            }
            OpI::CursorWalk {
                remove_mask,
                set_mask,
            } => cursor_walk(&mut sut, &mut model, remove_mask, set_mask)?,
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        check_layout(&sut)?;
    }

    // Every surviving key resolves to the model's value.
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    let keys: HashSet<&String> = sut.keys().into_iter().collect();
    prop_assert_eq!(keys, model.keys().collect::<HashSet<_>>());
    Ok(())
}

// Property: state-machine equivalence against a HashMap model.
// Invariants exercised across random operation sequences:
// - insert reports Inserted/Updated exactly as the model predicts.
// - insert_returning_previous / remove_returning_previous hand back the
//   model's evicted pair.
// - Cursor walks visit every live entry exactly once, tolerate removal of
//   the current entry, and never change capacity.
// - Capacity stays a power of two >= 4 with len <= capacity; the occupied
//   slot count equals len after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = HashTable::new(hash_string::<String>, equal_string::<String>);
        run_scenario(sut, &pool, ops)?;
    }
}

// Property: same invariants when every key routes to the same bucket, which
// stresses equality resolution and slot reuse within one bucket.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = HashTable::new(|_: &String| 7, equal_string::<String>);
        run_scenario(sut, &pool, ops)?;
    }
}
