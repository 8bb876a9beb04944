pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, dim, error, header, info, muted, section, status, success, summary_row, warn, yes_no};
pub use table::{TableBuilder, stats_table, users_table};
pub use theme::{theme, Theme};
