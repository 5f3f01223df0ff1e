pub mod markdown;

pub use markdown::{Sections, collect_sections, format_entry, format_section, render_listing};
