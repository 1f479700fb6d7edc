//! Built-in test receipt

use chrono::Local;
use crab_receipt::{ItemOption, LineItem, Order, Payment, ReceiptConfig, ReceiptJob, StoreInfo};
use rust_decimal::Decimal;

use crate::config::AgentConfig;

/// A small paid order exercising options, taxes and the drawer kick
pub fn test_receipt(config: &AgentConfig) -> ReceiptJob {
    let receipt_config = ReceiptConfig::default()
        .with_store(StoreInfo {
            name: "Print Agent".into(),
            address: Some(config.target.kind().to_uppercase()),
            footer: Some(format!("{} / {}", config.paper, config.charset)),
            ..StoreInfo::default()
        })
        .with_paper(config.paper)
        .with_charset(config.charset)
        .with_currency(config.currency.clone())
        .with_language(config.language)
        .with_open_drawer(true);

    let order = Order {
        number: "TEST-0001".into(),
        created_at: Local::now().into(),
        order_type: "dine_in".into(),
        table: Some("1".into()),
        guests: Some(2),
        customer: None,
        items: vec![
            LineItem::new("Espresso", 2, Decimal::new(150, 2)).with_tax_rate(Decimal::new(10, 0)),
            LineItem::new("Croissant", 1, Decimal::new(220, 2))
                .with_option(ItemOption {
                    group: None,
                    name: "Butter".into(),
                    price: Decimal::new(30, 2),
                })
                .with_tax_rate(Decimal::new(10, 0)),
        ],
        discount: None,
        surcharge: None,
        payments: vec![Payment {
            method: "cash".into(),
            amount: Decimal::new(1000, 2),
        }],
        notes: None,
        reprint: false,
        pre_payment: false,
        void_reason: None,
        qr_data: None,
    };

    ReceiptJob::new(order, receipt_config)
}
