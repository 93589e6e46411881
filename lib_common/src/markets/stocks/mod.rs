//! # Stocks
//!
//! - **`record`**: `StockRecord` and the `PriceModel` collection.
//! - **`stocklist`**: the hard-coded seed prices handed to the broadcast
//!   manager at construction.
//! - **`transform`**: the `RecordTransform` capability and the stock price
//!   transforms (`basic_transform`, `identity_transform`).

/// Stock price data model.
pub mod record;
/// Fixed seed dataset.
pub mod stocklist;
/// Price transforms applied on each tick.
pub mod transform;

pub use record::{PriceModel, StockRecord};
pub use stocklist::Stocklist;
pub use transform::{basic_transform, basic_transform_with, identity_transform, RecordTransform};
