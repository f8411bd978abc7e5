mod edit;
mod grid;
mod type_tabs;

pub use edit::draw_edit_overlay;
pub use grid::draw_grid;
pub use type_tabs::draw_type_tabs;
