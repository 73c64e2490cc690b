use std::fmt::Write as _;
use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Write an order-items CSV shaped like the Olist export, with `rows` seeded random items.
pub fn write_order_items(path: &Path, rows: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(
        "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value\n",
    );
    for row in 0..rows {
        let price: f64 = (rng.random_range(5.0..500.0_f64) * 100.0).round() / 100.0;
        let freight: f64 = (rng.random_range(2.0..60.0_f64) * 100.0).round() / 100.0;
        writeln!(
            csv,
            "order{row:05},1,product{},seller{},2017-09-19 09:45:35,{price:.2},{freight:.2}",
            row % 37,
            row % 11
        )
        .unwrap();
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, csv).unwrap();
}

/// Write a CSV whose only numeric column is `price`.
pub fn write_price_only(path: &Path) {
    std::fs::write(path, "order_id,price\na,10.0\nb,20.0\nc,30.0\n").unwrap();
}
