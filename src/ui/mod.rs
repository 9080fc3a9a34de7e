pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, section, success, summary_row, timing, warn};
pub use progress::LoadSpinner;
pub use table::{failures_table, report_table};
pub use theme::{theme, Theme};
