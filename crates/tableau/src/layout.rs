//! Layout strategies for composite canvas items.
//!
//! A `Layout` value computes child placements for a composite's rect and,
//! separately, aggregates the composite's own sizing from its children.
//! Layouts are plain values so composer snapshots can carry them off the
//! UI thread.

use geom::{Margins, Orientation, Point, Rect, Size};

use crate::{
    sizing::{Constraint, Dim, Sizing},
    solver::solve,
};

/// Cross-axis placement policy for rows and columns.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum Align {
    Start,
    #[default]
    Center,
    End,
}

/// What a layout needs to know about one child: its effective sizing and
/// its current rect, if it has been laid out before.
#[derive(Debug, Clone)]
pub struct LayoutChild {
    pub sizing: Sizing,
    pub rect: Option<Rect>,
}

impl LayoutChild {
    pub fn new(sizing: Sizing) -> Self {
        Self { sizing, rect: None }
    }
}

/// A child-placement strategy.
#[derive(Debug, Clone)]
pub enum Layout {
    /// All children occupy the same rect; later children paint on top.
    Overlap { margins: Margins },
    /// Children side by side along the x axis.
    Row {
        margins: Margins,
        spacing: i32,
        align: Align,
    },
    /// Children stacked along the y axis.
    Column {
        margins: Margins,
        spacing: i32,
        align: Align,
    },
    /// A fixed grid of cells addressed by position. `cells` maps each
    /// cell (column-major) to an index into the child list; a cell may be
    /// empty.
    Grid {
        columns: usize,
        rows: usize,
        margins: Margins,
        spacing: i32,
        cells: Vec<Option<usize>>,
    },
    /// A single child viewed through a viewport. With
    /// `auto_resize_contents` the child is force-fit to the viewport;
    /// otherwise it is sized once to its preference and then left alone.
    Scroll { auto_resize_contents: bool },
    /// Panes separated by draggable bars. `sizings` carries one persisted
    /// sizing per pane, parallel to the child list.
    Splitter {
        orientation: Orientation,
        sizings: Vec<Sizing>,
    },
}

impl Default for Layout {
    fn default() -> Self {
        Self::overlap()
    }
}

impl Layout {
    pub fn overlap() -> Self {
        Self::Overlap {
            margins: Margins::default(),
        }
    }

    pub fn row(spacing: i32) -> Self {
        Self::Row {
            margins: Margins::default(),
            spacing,
            align: Align::default(),
        }
    }

    pub fn column(spacing: i32) -> Self {
        Self::Column {
            margins: Margins::default(),
            spacing,
            align: Align::default(),
        }
    }

    pub fn grid(columns: usize, rows: usize) -> Self {
        assert!(columns > 0 && rows > 0, "grid must have at least one cell");
        Self::Grid {
            columns,
            rows,
            margins: Margins::default(),
            spacing: 0,
            cells: vec![None; columns * rows],
        }
    }

    pub fn scroll() -> Self {
        Self::Scroll {
            auto_resize_contents: false,
        }
    }

    pub fn splitter(orientation: Orientation) -> Self {
        Self::Splitter {
            orientation,
            sizings: Vec::new(),
        }
    }

    pub fn with_margins(mut self, m: Margins) -> Self {
        match &mut self {
            Self::Overlap { margins }
            | Self::Row { margins, .. }
            | Self::Column { margins, .. }
            | Self::Grid { margins, .. } => *margins = m,
            Self::Scroll { .. } | Self::Splitter { .. } => {}
        }
        self
    }

    pub fn with_align(mut self, a: Align) -> Self {
        match &mut self {
            Self::Row { align, .. } | Self::Column { align, .. } => *align = a,
            _ => {}
        }
        self
    }

    /// Compute per-child rects, in child order and parent-local
    /// coordinates. `None` means "leave the child's current layout
    /// untouched" (unplaced grid cells, settled scroll content).
    pub fn place(&self, origin: Point, size: Size, children: &[LayoutChild]) -> Vec<Option<Rect>> {
        match self {
            Self::Overlap { margins } => {
                let rect = inset(Rect::from_origin_size(origin, size), *margins);
                children
                    .iter()
                    .map(|child| Some(fit_child(rect, &child.sizing)))
                    .collect()
            }
            Self::Row {
                margins,
                spacing,
                align,
            } => place_linear(
                inset(Rect::from_origin_size(origin, size), *margins),
                children,
                *spacing,
                *align,
                true,
            ),
            Self::Column {
                margins,
                spacing,
                align,
            } => place_linear(
                inset(Rect::from_origin_size(origin, size), *margins),
                children,
                *spacing,
                *align,
                false,
            ),
            Self::Grid {
                columns,
                rows,
                margins,
                spacing,
                cells,
            } => {
                let grid = GridRef {
                    columns: *columns,
                    rows: *rows,
                    cells,
                };
                place_grid(
                    inset(Rect::from_origin_size(origin, size), *margins),
                    children,
                    *spacing,
                    &grid,
                )
            }
            Self::Scroll {
                auto_resize_contents,
            } => place_scroll(origin, size, children, *auto_resize_contents),
            Self::Splitter {
                orientation,
                sizings,
            } => place_splitter(origin, size, children.len(), *orientation, sizings),
        }
    }

    /// Aggregate the composite's own sizing from its children.
    pub fn aggregate_sizing(&self, children: &[LayoutChild]) -> Sizing {
        match self {
            Self::Overlap { margins } => {
                let mut sizing = overlap_sizing(children.iter().map(|c| &c.sizing));
                adjust_sizing(&mut sizing, *margins, 0, 0);
                sizing
            }
            Self::Row {
                margins, spacing, ..
            } => {
                let mut sizing = linear_sizing(children.iter().map(|c| &c.sizing), true);
                let total = *spacing * (children.len().saturating_sub(1)) as i32;
                adjust_sizing(&mut sizing, *margins, total, 0);
                sizing
            }
            Self::Column {
                margins, spacing, ..
            } => {
                let mut sizing = linear_sizing(children.iter().map(|c| &c.sizing), false);
                let total = *spacing * (children.len().saturating_sub(1)) as i32;
                adjust_sizing(&mut sizing, *margins, 0, total);
                sizing
            }
            Self::Grid {
                columns,
                rows,
                margins,
                spacing,
                cells,
            } => {
                let grid = GridRef {
                    columns: *columns,
                    rows: *rows,
                    cells,
                };
                grid_sizing(children, *margins, *spacing, &grid)
            }
            Self::Scroll { .. } => Sizing::new(),
            Self::Splitter {
                orientation,
                sizings,
            } => linear_sizing(sizings.iter(), *orientation == Orientation::Vertical),
        }
    }

    /// For splitters: the primary-axis origins of every pane after the
    /// first, i.e. the bar positions, in parent-local coordinates.
    pub fn splitter_boundaries(&self, size: Size, pane_count: usize) -> Vec<i32> {
        let Self::Splitter {
            orientation,
            sizings,
        } = self
        else {
            return Vec::new();
        };
        let solved = solve_splitter(size, pane_count, *orientation, sizings);
        solved.origins.into_iter().skip(1).collect()
    }
}

/// Borrowed view of a grid's cell table.
struct GridRef<'a> {
    columns: usize,
    rows: usize,
    cells: &'a [Option<usize>],
}

impl GridRef<'_> {
    fn cell(&self, col: usize, row: usize) -> Option<usize> {
        self.cells[col * self.rows + row]
    }
}

/// Shrink a rect by margins.
fn inset(rect: Rect, m: Margins) -> Rect {
    Rect::new(
        rect.tl.x + m.left,
        rect.tl.y + m.top,
        (rect.w - m.horizontal()).max(0),
        (rect.h - m.vertical()).max(0),
    )
}

/// Apply a child's aspect-ratio bounds to its computed rect.
fn fit_child(rect: Rect, sizing: &Sizing) -> Rect {
    let aspect = rect.size().aspect_ratio();
    if let Some(minimum) = sizing.minimum_aspect_ratio {
        if aspect < minimum {
            return rect.fit_aspect_ratio(minimum);
        }
    }
    if let Some(maximum) = sizing.maximum_aspect_ratio {
        if aspect > maximum {
            return rect.fit_aspect_ratio(maximum);
        }
    }
    if let Some(preferred) = sizing.preferred_aspect_ratio {
        return rect.fit_aspect_ratio(preferred);
    }
    rect
}

/// Row (`horizontal == true`) and column placement share one body with
/// the axes swapped. `content` is already inset by margins.
fn place_linear(
    content: Rect,
    children: &[LayoutChild],
    spacing: i32,
    align: Align,
    horizontal: bool,
) -> Vec<Option<Rect>> {
    let spacing_total = spacing * (children.len().saturating_sub(1)) as i32;
    let (primary_origin, primary_extent, cross_origin, cross_extent) = if horizontal {
        (content.tl.x, content.w - spacing_total, content.tl.y, content.h)
    } else {
        (content.tl.y, content.h - spacing_total, content.tl.x, content.w)
    };
    let constraints: Vec<Constraint> = children
        .iter()
        .map(|child| {
            if horizontal {
                child.sizing.width_constraint(primary_extent)
            } else {
                child.sizing.height_constraint(primary_extent)
            }
        })
        .collect();
    let solved = solve(primary_origin, primary_extent, &constraints, spacing);
    children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            // Cross-axis: the child's own maximum, capped by the
            // available extent, else the full extent.
            let cross_max = if horizontal {
                child.sizing.maximum_height
            } else {
                child.sizing.maximum_width
            };
            let cross =
                cross_max.map_or(cross_extent, |d| d.resolve(cross_extent).min(cross_extent));
            let cross_pos = match align {
                Align::Start => cross_origin,
                Align::Center => cross_origin + (cross_extent - cross) / 2,
                Align::End => cross_origin + cross_extent - cross,
            };
            let rect = if horizontal {
                Rect::new(solved.origins[i], cross_pos, solved.sizes[i], cross)
            } else {
                Rect::new(cross_pos, solved.origins[i], cross, solved.sizes[i])
            };
            Some(fit_child(rect, &child.sizing))
        })
        .collect()
}

fn place_grid(
    content: Rect,
    children: &[LayoutChild],
    spacing: i32,
    grid: &GridRef<'_>,
) -> Vec<Option<Rect>> {
    // Column and row extents are solved independently; each column's
    // sizing overlaps the cells stacked in it, and symmetrically for rows.
    let column_spacing = spacing * (grid.columns.saturating_sub(1)) as i32;
    let content_width = content.w - column_spacing;
    let column_constraints: Vec<Constraint> = (0..grid.columns)
        .map(|col| {
            overlap_sizing(
                (0..grid.rows)
                    .filter_map(|row| grid.cell(col, row))
                    .map(|i| &children[i].sizing),
            )
            .width_constraint(content_width)
        })
        .collect();
    let solved_x = solve(content.tl.x, content_width, &column_constraints, spacing);

    let row_spacing = spacing * (grid.rows.saturating_sub(1)) as i32;
    let content_height = content.h - row_spacing;
    let row_constraints: Vec<Constraint> = (0..grid.rows)
        .map(|row| {
            overlap_sizing(
                (0..grid.columns)
                    .filter_map(|col| grid.cell(col, row))
                    .map(|i| &children[i].sizing),
            )
            .height_constraint(content_height)
        })
        .collect();
    let solved_y = solve(content.tl.y, content_height, &row_constraints, spacing);

    let mut placements: Vec<Option<Rect>> = vec![None; children.len()];
    for col in 0..grid.columns {
        for row in 0..grid.rows {
            if let Some(index) = grid.cell(col, row) {
                let rect = Rect::new(
                    solved_x.origins[col],
                    solved_y.origins[row],
                    solved_x.sizes[col],
                    solved_y.sizes[row],
                );
                placements[index] = Some(fit_child(rect, &children[index].sizing));
            }
        }
    }
    placements
}

fn place_scroll(
    origin: Point,
    size: Size,
    children: &[LayoutChild],
    auto_resize: bool,
) -> Vec<Option<Rect>> {
    children
        .iter()
        .map(|child| match child.rect {
            // Content keeps its scroll offset but tracks the viewport size.
            Some(rect) if auto_resize => Some(Rect::from_origin_size(rect.origin(), size)),
            // Settled content owns its layout from here on.
            Some(_) => None,
            // First layout: the content gets its preferred size, falling
            // back to the viewport per axis.
            None => {
                let w = child
                    .sizing
                    .preferred_width
                    .map_or(size.w, |d| d.resolve(size.w));
                let h = child
                    .sizing
                    .preferred_height
                    .map_or(size.h, |d| d.resolve(size.h));
                Some(Rect::new(origin.x, origin.y, w, h))
            }
        })
        .collect()
}

fn solve_splitter(
    size: Size,
    pane_count: usize,
    orientation: Orientation,
    sizings: &[Sizing],
) -> crate::solver::Solved {
    assert_eq!(
        sizings.len(),
        pane_count,
        "splitter sizings must parallel the pane list"
    );
    let extent = match orientation {
        Orientation::Vertical => size.w,
        Orientation::Horizontal => size.h,
    };
    let constraints: Vec<Constraint> = sizings
        .iter()
        .map(|sizing| match orientation {
            Orientation::Vertical => sizing.width_constraint(extent),
            Orientation::Horizontal => sizing.height_constraint(extent),
        })
        .collect();
    solve(0, extent, &constraints, 0)
}

fn place_splitter(
    origin: Point,
    size: Size,
    pane_count: usize,
    orientation: Orientation,
    sizings: &[Sizing],
) -> Vec<Option<Rect>> {
    let solved = solve_splitter(size, pane_count, orientation, sizings);
    (0..pane_count)
        .map(|i| {
            Some(match orientation {
                Orientation::Vertical => Rect::new(
                    origin.x + solved.origins[i],
                    origin.y,
                    solved.sizes[i],
                    size.h,
                ),
                Orientation::Horizontal => Rect::new(
                    origin.x,
                    origin.y + solved.origins[i],
                    size.w,
                    solved.sizes[i],
                ),
            })
        })
        .collect()
}

/// Numeric weight used to compare bounds the way the original did: raw
/// values, with fractions ordering below any plausible absolute.
fn weight(d: Dim) -> f32 {
    match d {
        Dim::Absolute(v) => v as f32,
        Dim::Fraction(f) => f,
    }
}

fn combine_max(a: Option<Dim>, b: Option<Dim>) -> Option<Dim> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if weight(a) >= weight(b) { a } else { b }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Like `combine_max` but an absent value on either side clears the
/// result: one unbounded child unbounds an overlapped maximum.
fn combine_min_clearing(a: Option<Dim>, b: Option<Dim>) -> Option<Dim> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if weight(a) <= weight(b) { a } else { b }),
        _ => None,
    }
}

fn combine_add(a: Option<Dim>, b: Option<Dim>) -> Option<Dim> {
    match (a, b) {
        (Some(a), Some(b)) => Some(add_dims(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Addition that clears when either side is absent: a summed maximum is
/// only meaningful if every child has one.
fn combine_add_clearing(a: Option<Dim>, b: Option<Dim>) -> Option<Dim> {
    match (a, b) {
        (Some(a), Some(b)) => Some(add_dims(a, b)),
        _ => None,
    }
}

fn add_dims(a: Dim, b: Dim) -> Dim {
    match (a, b) {
        (Dim::Absolute(a), Dim::Absolute(b)) => Dim::Absolute(a + b),
        (Dim::Fraction(a), Dim::Fraction(b)) => Dim::Fraction(a + b),
        // Mixed sums degrade to absolute units via the raw weights.
        (a, b) => Dim::Absolute((weight(a) + weight(b)) as i32),
    }
}

/// One axis of an aggregate under construction.
#[derive(Default, Clone, Copy)]
struct AxisSizing {
    preferred: Option<Dim>,
    minimum: Option<Dim>,
    maximum: Option<Dim>,
}

/// Sizing for children assumed stacked on one another: maxima of minimums
/// and preferreds, minimum of maximums (one unbounded child unbounds the
/// result).
fn overlap_sizing<'a>(children: impl Iterator<Item = &'a Sizing>) -> Sizing {
    let mut width = AxisSizing::default();
    let mut height = AxisSizing::default();
    let mut first = true;
    for child in children {
        width.preferred = combine_max(width.preferred, child.preferred_width);
        height.preferred = combine_max(height.preferred, child.preferred_height);
        width.minimum = combine_max(width.minimum, child.minimum_width);
        height.minimum = combine_max(height.minimum, child.minimum_height);
        if first {
            width.maximum = child.maximum_width;
            height.maximum = child.maximum_height;
        } else {
            width.maximum = combine_min_clearing(width.maximum, child.maximum_width);
            height.maximum = combine_min_clearing(height.maximum, child.maximum_height);
        }
        first = false;
    }
    from_axes(width, height)
}

/// Sizing for children in a row (`horizontal`) or column: sums along the
/// primary axis, overlap semantics across it.
fn linear_sizing<'a>(children: impl Iterator<Item = &'a Sizing>, horizontal: bool) -> Sizing {
    let mut primary = AxisSizing::default();
    let mut cross = AxisSizing::default();
    let mut first = true;
    for child in children {
        let (child_primary, child_cross) = axes_of(child, horizontal);
        primary.preferred = combine_add(primary.preferred, child_primary.preferred);
        primary.minimum = combine_add(primary.minimum, child_primary.minimum);
        cross.preferred = combine_max(cross.preferred, child_cross.preferred);
        cross.minimum = combine_max(cross.minimum, child_cross.minimum);
        if first {
            primary.maximum = child_primary.maximum;
            cross.maximum = child_cross.maximum;
        } else {
            primary.maximum = combine_add_clearing(primary.maximum, child_primary.maximum);
            cross.maximum = combine_min_clearing(cross.maximum, child_cross.maximum);
        }
        first = false;
    }
    if horizontal {
        from_axes(primary, cross)
    } else {
        from_axes(cross, primary)
    }
}

/// Split a sizing into (primary, cross) axes for a linear layout.
fn axes_of(sizing: &Sizing, horizontal: bool) -> (AxisSizing, AxisSizing) {
    let width = AxisSizing {
        preferred: sizing.preferred_width,
        minimum: sizing.minimum_width,
        maximum: sizing.maximum_width,
    };
    let height = AxisSizing {
        preferred: sizing.preferred_height,
        minimum: sizing.minimum_height,
        maximum: sizing.maximum_height,
    };
    if horizontal { (width, height) } else { (height, width) }
}

fn from_axes(width: AxisSizing, height: AxisSizing) -> Sizing {
    Sizing {
        preferred_width: width.preferred,
        minimum_width: width.minimum,
        maximum_width: width.maximum,
        preferred_height: height.preferred,
        minimum_height: height.minimum,
        maximum_height: height.maximum,
        ..Sizing::new()
    }
}

fn grid_sizing(
    children: &[LayoutChild],
    margins: Margins,
    spacing: i32,
    grid: &GridRef<'_>,
) -> Sizing {
    let mut width = AxisSizing::default();
    let mut height = AxisSizing::default();
    for col in 0..grid.columns {
        let column = overlap_sizing(
            (0..grid.rows)
                .filter_map(|row| grid.cell(col, row))
                .map(|i| &children[i].sizing),
        );
        width.preferred = combine_add(width.preferred, column.preferred_width);
        width.minimum = combine_add(width.minimum, column.minimum_width);
        width.maximum = combine_add(width.maximum, column.maximum_width);
    }
    for row in 0..grid.rows {
        let row_sizing = overlap_sizing(
            (0..grid.columns)
                .filter_map(|col| grid.cell(col, row))
                .map(|i| &children[i].sizing),
        );
        height.preferred = combine_add(height.preferred, row_sizing.preferred_height);
        height.minimum = combine_add(height.minimum, row_sizing.minimum_height);
        height.maximum = combine_add(height.maximum, row_sizing.maximum_height);
    }
    let mut sizing = from_axes(width, height);
    adjust_sizing(
        &mut sizing,
        margins,
        spacing * (grid.columns.saturating_sub(1)) as i32,
        spacing * (grid.rows.saturating_sub(1)) as i32,
    );
    sizing
}

/// Add margins and total spacing to every present absolute bound.
fn adjust_sizing(sizing: &mut Sizing, margins: Margins, x_spacing: i32, y_spacing: i32) {
    let adjust = |d: &mut Option<Dim>, delta: i32| {
        if let Some(Dim::Absolute(v)) = d {
            *v += delta;
        }
    };
    let dx = margins.horizontal() + x_spacing;
    let dy = margins.vertical() + y_spacing;
    adjust(&mut sizing.minimum_width, dx);
    adjust(&mut sizing.maximum_width, dx);
    adjust(&mut sizing.preferred_width, dx);
    adjust(&mut sizing.minimum_height, dy);
    adjust(&mut sizing.maximum_height, dy);
    adjust(&mut sizing.preferred_height, dy);
}
