//! Auto-placement for nodes and buses that arrive without geometry.
//!
//! Placement is a plain grid per group: children fill rows of
//! `columns` cells, and buses take the rows below them.

use crate::config::LayoutOptions;
use crate::model::Rect;

/// Rectangle for the `index`-th child of a group
pub fn node_slot(options: &LayoutOptions, index: usize) -> Rect {
    let columns = options.columns.max(1);
    cell(options, index % columns, index / columns)
}

/// Rectangle for the `index`-th bus of a group with `children` children
pub fn bus_slot(options: &LayoutOptions, children: usize, index: usize) -> Rect {
    let columns = options.columns.max(1);
    let first_row = children.div_ceil(columns);
    let mut rect = cell(options, index % columns, first_row + index / columns);
    rect.height = options.node_height / 4.0;
    rect
}

fn cell(options: &LayoutOptions, column: usize, row: usize) -> Rect {
    Rect::new(
        options.origin.x + column as f64 * (options.node_width + options.horizontal_spacing),
        options.origin.y + row as f64 * (options.node_height + options.vertical_spacing),
        options.node_width,
        options.node_height,
    )
}
