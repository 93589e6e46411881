use super::record::{PriceModel, StockRecord};

/// Provider of the demo's seed prices.
pub struct Stocklist;

impl Stocklist {
    /// All stocks available for regular updates.
    pub fn find() -> PriceModel {
        PriceModel {
            pricelist: vec![
                StockRecord::new("IBM", "Int. Bus. Machines", 153.7, 154.17, 154.03),
                StockRecord::new("DVMT", "Dell Computer", 80.36, 81.5, 81.4),
                StockRecord::new("AAPL", "Apple", 169.31, 170.59, 169.86),
                StockRecord::new("HPE", "Hewlett Packard", 13.78, 14.67, 14.12),
                StockRecord::new("AMD", "Advanced Micro Dev.", 10.025, 10.5, 10.5),
                StockRecord::new("INTC", "Intel Corp.", 45.49, 46.5, 46.0),
            ],
        }
    }
}
