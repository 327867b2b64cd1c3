//! Property-based tests for the ordered map using proptest
//!
//! Random operation sequences run against both the concurrent map and a
//! `BTreeMap` model; every observable result must agree.

use super::tree::OrderedTree;
use super::{ConcurrentOrderedMap, Natural, Replaced};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone)]
enum Op {
    Emplace(u8, u16, bool),
    Replace(u8, u16, bool),
    Erase(u8),
    EraseIfOdd(u8),
    Remove(u8),
    Find(u8),
    LowerBound(u8),
    Infimum(u8),
    DeleteIfAbove(u16),
    Bump(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Small key space so hits and misses are both common
    let key = 0u8..64;
    prop_oneof![
        3 => (key.clone(), any::<u16>(), any::<bool>()).prop_map(|(k, v, f)| Op::Emplace(k, v, f)),
        2 => (key.clone(), any::<u16>(), any::<bool>()).prop_map(|(k, v, f)| Op::Replace(k, v, f)),
        1 => key.clone().prop_map(Op::Erase),
        1 => key.clone().prop_map(Op::EraseIfOdd),
        1 => key.clone().prop_map(Op::Remove),
        2 => key.clone().prop_map(Op::Find),
        2 => key.clone().prop_map(Op::LowerBound),
        2 => key.clone().prop_map(Op::Infimum),
        1 => any::<u16>().prop_map(Op::DeleteIfAbove),
        1 => key.prop_map(Op::Bump),
    ]
}

fn model_infimum(model: &BTreeMap<u8, u16>, key: u8) -> Option<(u8, u16)> {
    model
        .range((Bound::Unbounded, Bound::Included(key)))
        .next_back()
        .map(|(k, v)| (*k, *v))
}

fn model_lower_bound(model: &BTreeMap<u8, u16>, key: u8) -> Option<(u8, u16)> {
    model.range(key..).next().map(|(k, v)| (*k, *v))
}

proptest! {
    #[test]
    fn test_matches_btreemap_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let map: ConcurrentOrderedMap<u8, u16> = ConcurrentOrderedMap::new();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Emplace(key, value, force) => {
                    let expected = force || !model.contains_key(&key);
                    if expected {
                        model.insert(key, value);
                    }
                    prop_assert_eq!(map.emplace(key, value, force), expected);
                }
                Op::Replace(key, value, force) => {
                    let expected = match model.get(&key).copied() {
                        None => {
                            model.insert(key, value);
                            Replaced::Inserted(value)
                        }
                        Some(_) if force => {
                            model.insert(key, value);
                            Replaced::Overwritten(value)
                        }
                        Some(current) => Replaced::Kept(current),
                    };
                    prop_assert_eq!(map.replace(key, value, force), expected);
                }
                Op::Erase(key) => {
                    prop_assert_eq!(map.erase(&key), model.remove(&key).is_some());
                }
                Op::EraseIfOdd(key) => {
                    let expected = model.get(&key).map_or(false, |value| value % 2 == 1);
                    if expected {
                        model.remove(&key);
                    }
                    prop_assert_eq!(map.erase_if(&key, |_, value| *value % 2 == 1), expected);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                Op::Find(key) => {
                    prop_assert_eq!(map.find(&key), model.get(&key).copied());
                    prop_assert_eq!(map.contains_key(&key), model.contains_key(&key));
                }
                Op::LowerBound(key) => {
                    let expected = model_lower_bound(&model, key);
                    prop_assert_eq!(map.lower_bound_key(&key), expected);
                    prop_assert_eq!(map.lower_bound(&key), expected.map(|(_, v)| v));
                }
                Op::Infimum(key) => {
                    let expected = model_infimum(&model, key);
                    prop_assert_eq!(map.find_infimum_key(&key), expected);
                    prop_assert_eq!(map.find_infimum(&key), expected.map(|(_, v)| v));
                }
                Op::DeleteIfAbove(threshold) => {
                    let before = model.len();
                    model.retain(|_, value| *value <= threshold);
                    prop_assert_eq!(map.delete_if(|_, value| *value > threshold), before - model.len());
                }
                Op::Bump(key) => {
                    let expected = model.get_mut(&key).map(|value| {
                        *value = value.wrapping_add(1);
                        *value
                    });
                    let actual = map.perform(&key, |_, value| {
                        *value = value.wrapping_add(1);
                        *value
                    });
                    prop_assert_eq!(actual, expected);
                }
            }
            prop_assert_eq!(map.len(), model.len());
        }

        let entries: Vec<(u8, u16)> = model.into_iter().collect();
        let mut seen = Vec::new();
        map.for_each_ro(|key, value| {
            seen.push((*key, *value));
            true
        });
        prop_assert_eq!(seen, entries);
    }

    #[test]
    fn test_tree_stays_balanced(
        inserts in prop::collection::vec(any::<i16>(), 0..300),
        removals in prop::collection::vec(any::<i16>(), 0..300)
    ) {
        let mut tree = OrderedTree::new(Natural);
        for key in &inserts {
            tree.insert(*key, ());
        }
        tree.assert_invariants();

        for key in &removals {
            tree.remove(key);
        }
        tree.assert_invariants();

        let mut expected: Vec<i16> = inserts.clone();
        expected.sort_unstable();
        expected.dedup();
        expected.retain(|key| !removals.contains(key));
        let keys: Vec<i16> = tree.iter().map(|(key, _)| *key).collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn test_infimum_never_exceeds_probe(
        keys in prop::collection::btree_set(any::<i32>(), 0..100),
        probe in any::<i32>()
    ) {
        let map: ConcurrentOrderedMap<i32, ()> = keys.iter().map(|key| (*key, ())).collect();

        match map.find_infimum_key(&probe) {
            Some((found, _)) => {
                prop_assert!(found <= probe);
                prop_assert_eq!(keys.range(..=probe).next_back(), Some(&found));
            }
            None => prop_assert!(keys.iter().all(|key| *key > probe)),
        }
        match map.lower_bound_key(&probe) {
            Some((found, _)) => {
                prop_assert!(found >= probe);
                prop_assert!(keys.range(probe..found).next().is_none());
            }
            None => prop_assert!(keys.iter().all(|key| *key < probe)),
        }
    }
}
