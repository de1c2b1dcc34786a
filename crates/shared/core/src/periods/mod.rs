mod bar;
mod kind;
mod poi;
mod time_range;

pub use bar::Bar;
pub use kind::PeriodKind;
pub use poi::PeriodPoi;
pub use time_range::{PricePoint, TimeRange, pick_extreme};
