pub mod item;
pub mod ledger;
pub mod movement;
pub mod store;

pub use item::StockItem;
pub use ledger::{StockError, StockLedger};
pub use movement::{MovementDirection, MovementRequest, StockMovement};
pub use store::StockStore;
