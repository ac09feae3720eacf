// SPDX-License-Identifier: Apache-2.0

use bijux_sheets_model::{column_index, column_letters, SheetRange};
use proptest::prelude::*;
use proptest::test_runner::Config;

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn column_letters_invert(index in 0_u32..1_000_000_u32) {
        let letters = column_letters(index);
        prop_assert!(letters.chars().all(|c| c.is_ascii_uppercase()));
        prop_assert_eq!(column_index(&letters), Some(index));
    }

    #[test]
    fn row_ranges_name_the_requested_row(row in 1_u32..1_000_000_u32) {
        let range = SheetRange::row("DB", 0, 2, row).expect("row range");
        prop_assert_eq!(range.a1(), format!("DB!A{row}:C{row}"));
    }
}
