pub mod bar;
pub mod bar_series;
pub mod timeframe;

pub use bar::Bar;
pub use bar_series::BarSeries;
pub use timeframe::Timeframe;
