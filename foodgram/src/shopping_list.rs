//! Plain-text rendering of the aggregated shopping list.

use crate::db::models::recipes::ShoppingListItem;

pub const FILE_NAME: &str = "shopping_cart.txt";

/// Format one aggregated row; the unit follows the amount with no separator.
pub fn render_line(item: &ShoppingListItem) -> String {
    format!("{} - {}{}", item.name, item.total, item.measurement_unit)
}

/// Render the report: one line per row, in the given order. An empty list yields an empty body.
pub fn render(items: &[ShoppingListItem]) -> String {
    items.iter().map(render_line).collect::<Vec<_>>().join("\n")
}
