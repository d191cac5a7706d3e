pub mod instrument;
pub mod trade;
pub mod window;

pub use instrument::{Instrument, OptionType};
pub use trade::{Direction, RawTrade, TradePage, TradeRecord};
pub use window::TimeWindow;
