use arena_domain::entities::ledger::{BuySpend, LedgerError, PortfolioLedger};
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn avg_price_is_quantity_weighted_mean(
        fills in prop::collection::vec((0.01f64..10_000.0, 0.001f64..10.0), 1..20)
    ) {
        let mut ledger = PortfolioLedger::new(1e12);
        let mut weighted = 0.0;
        let mut total_qty = 0.0;

        for (idx, (price, qty)) in fills.iter().copied().enumerate() {
            ledger
                .buy("BTCUSD", idx as i64, BuySpend::Quantity(qty), price, 0.0)
                .unwrap();
            weighted += price * qty;
            total_qty += qty;
        }

        let expected = weighted / total_qty;
        let avg = ledger.position_avg_price("BTCUSD");
        prop_assert!((avg - expected).abs() <= expected * 1e-9);
    }

    #[test]
    fn oversell_never_mutates_state(
        qty in 0.001f64..10.0,
        price in 0.01f64..10_000.0,
        excess in 1.0001f64..10.0
    ) {
        let mut ledger = PortfolioLedger::new(1_000_000.0);
        ledger
            .buy("BTCUSD", 1, BuySpend::Quantity(qty), price, 0.0)
            .unwrap();
        let balance = ledger.balance();
        let trades = ledger.trades().len();

        let err = ledger
            .sell("BTCUSD", 2, qty * excess, price, 0.0)
            .unwrap_err();

        prop_assert!(
            matches!(err, LedgerError::InsufficientPosition { .. }),
            "expected InsufficientPosition, got {:?}",
            err
        );
        prop_assert_eq!(ledger.trades().len(), trades);
        prop_assert!((ledger.balance() - balance).abs() < 1e-12);
        prop_assert!((ledger.position_qty("BTCUSD") - qty).abs() < 1e-12);
    }

    #[test]
    fn equity_identity_holds_after_any_mark(
        qty in 0.001f64..10.0,
        buy_price in 0.01f64..10_000.0,
        mark_price in 0.01f64..10_000.0
    ) {
        let mut ledger = PortfolioLedger::new(1_000_000.0);
        ledger
            .buy("BTCUSD", 1, BuySpend::Quantity(qty), buy_price, 0.001)
            .unwrap();

        let mut prices = BTreeMap::new();
        prices.insert("BTCUSD".to_string(), mark_price);
        let equity = ledger.mark_to_market(&prices);

        let expected = ledger.balance() + qty * mark_price;
        prop_assert!((equity - expected).abs() <= expected.abs() * 1e-12 + 1e-9);
    }

    #[test]
    fn balance_never_goes_negative(
        fills in prop::collection::vec((0.01f64..1_000.0, 0.001f64..5.0), 1..30)
    ) {
        let mut ledger = PortfolioLedger::new(1_000.0);
        for (idx, (price, qty)) in fills.iter().copied().enumerate() {
            let _ = ledger.buy("BTCUSD", idx as i64, BuySpend::Quantity(qty), price, 0.001);
            prop_assert!(ledger.balance() >= 0.0);
        }
    }
}
