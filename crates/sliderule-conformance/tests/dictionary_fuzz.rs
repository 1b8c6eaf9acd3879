//! `Dictionary` add/remove invariants (spec §4.1): every key added and not
//! since removed is still findable with its latest value, and `len()`
//! always matches the live key set.

use std::collections::HashMap;

use proptest::prelude::*;
use sliderule_core::Dictionary;

#[derive(Debug, Clone)]
enum Op {
    Add(String, i64),
    Remove(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = "[a-e]";
    prop_oneof![
        (key, any::<i64>()).prop_map(|(k, v)| Op::Add(k, v)),
        key.prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn matches_a_reference_hashmap_under_random_add_remove(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut dict: Dictionary<i64> = Dictionary::new();
        let mut model: HashMap<String, i64> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(key, value) => {
                    dict.add(&key, value, false);
                    model.insert(key, value);
                }
                Op::Remove(key) => {
                    let removed_from_dict = dict.remove(&key);
                    let removed_from_model = model.remove(&key).is_some();
                    prop_assert_eq!(removed_from_dict, removed_from_model);
                }
            }
        }

        prop_assert_eq!(dict.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(dict.find(key), Some(value));
        }
        for absent in ["f", "g", "z"] {
            if !model.contains_key(absent) {
                prop_assert_eq!(dict.find(absent), None);
            }
        }
    }
}
