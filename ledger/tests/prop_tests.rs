use proptest::prelude::*;

use tally_ledger::{effective_fee, merkle_root};
use tally_types::Amount;

proptest! {
    #[test]
    fn default_fee_is_one_percent_capped(amount in 1u64..10_000_000) {
        let fee = effective_fee(Amount::new(amount), None).raw();
        prop_assert_eq!(fee, (amount / 100).min(1000));
    }

    #[test]
    fn positive_fee_is_taken_verbatim(amount in 1u64..10_000_000, fee in 1i64..100_000) {
        prop_assert_eq!(effective_fee(Amount::new(amount), Some(fee)).raw(), fee as u64);
    }

    #[test]
    fn merkle_root_is_deterministic(ids in prop::collection::vec("[a-z0-9]{1,12}", 0..16)) {
        let root = merkle_root(&ids);
        prop_assert_eq!(&root, &merkle_root(&ids));
        prop_assert_eq!(root.is_empty(), ids.is_empty());
    }

    #[test]
    fn appending_a_leaf_changes_the_root(ids in prop::collection::vec("[a-z0-9]{1,12}", 1..16)) {
        let mut extended = ids.clone();
        extended.push("extra-leaf".to_string());
        prop_assert_ne!(merkle_root(&ids), merkle_root(&extended));
    }
}
