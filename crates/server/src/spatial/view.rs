//! Axis-aligned rectangles used for storage and queries.

use std::fmt;

use super::SpatialError;

/// Axis-aligned rectangle `[lx, rx] x [ty, by]`.
///
/// The y axis grows downwards, so `ty` is the top edge and `by` the bottom.
/// Both intervals are closed. A view with `lx == rx` and `ty == by` covers a
/// single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    lx: f64,
    rx: f64,
    ty: f64,
    by: f64,
}

impl View {
    /// Create a view.
    ///
    /// # Panics
    ///
    /// Panics if `rx < lx`, `by < ty` or any bound is NaN. Use
    /// [`View::try_new`] for unchecked input.
    pub fn new(lx: f64, rx: f64, ty: f64, by: f64) -> Self {
        match Self::try_new(lx, rx, ty, by) {
            Ok(view) => view,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a view, reporting inverted bounds instead of panicking.
    pub fn try_new(lx: f64, rx: f64, ty: f64, by: f64) -> Result<Self, SpatialError> {
        if lx <= rx && ty <= by {
            Ok(Self { lx, rx, ty, by })
        } else {
            Err(SpatialError::InvertedBounds { lx, rx, ty, by })
        }
    }

    /// A zero-area view covering the single point `(x, y)`.
    #[inline]
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, x, y, y)
    }

    #[inline]
    pub fn lx(&self) -> f64 {
        self.lx
    }

    #[inline]
    pub fn rx(&self) -> f64 {
        self.rx
    }

    #[inline]
    pub fn ty(&self) -> f64 {
        self.ty
    }

    #[inline]
    pub fn by(&self) -> f64 {
        self.by
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.rx - self.lx
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.by - self.ty
    }

    /// Vertical split line used by [`View::quarters`].
    #[inline]
    pub fn mid_x(&self) -> f64 {
        self.lx + self.width() / 2.0
    }

    /// Horizontal split line used by [`View::quarters`].
    #[inline]
    pub fn mid_y(&self) -> f64 {
        self.ty + self.height() / 2.0
    }

    /// Check whether `(x, y)` lies inside the view, edges included.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.lx && x <= self.rx && y >= self.ty && y <= self.by
    }

    /// Check whether `other` lies wholly inside `self`, edges included.
    #[inline]
    pub fn encloses(&self, other: &View) -> bool {
        other.lx >= self.lx && other.rx <= self.rx && other.ty >= self.ty && other.by <= self.by
    }

    /// Check whether two views share at least one point.
    ///
    /// True when an edge of either view passes through the other, which also
    /// covers one view lying wholly inside the other and the case of a long
    /// thin view crossing a wider one without either holding a corner of the
    /// other.
    pub fn overlaps(&self, other: &View) -> bool {
        self.crossed_by(other) || other.crossed_by(self)
    }

    /// Whether any of the four edges of `other` passes through `self`.
    fn crossed_by(&self, other: &View) -> bool {
        self.crosses_vertical(other.lx, other.ty, other.by)
            || self.crosses_vertical(other.rx, other.ty, other.by)
            || self.crosses_horizontal(other.ty, other.lx, other.rx)
            || self.crosses_horizontal(other.by, other.lx, other.rx)
    }

    /// Whether the vertical segment at `x` from `ty` down to `by` touches `self`.
    #[inline]
    fn crosses_vertical(&self, x: f64, ty: f64, by: f64) -> bool {
        x >= self.lx && x <= self.rx && by >= self.ty && ty <= self.by
    }

    /// Whether the horizontal segment at `y` from `lx` to `rx` touches `self`.
    #[inline]
    fn crosses_horizontal(&self, y: f64, lx: f64, rx: f64) -> bool {
        y >= self.ty && y <= self.by && rx >= self.lx && lx <= self.rx
    }

    /// Split at the midpoint of each axis.
    ///
    /// Returns `[top-left, top-right, bottom-left, bottom-right]`. Neighbouring
    /// quarters share their split line; the quadtree hands points on that
    /// line to the left/top quarter.
    pub fn quarters(&self) -> [View; 4] {
        let mx = self.mid_x();
        let my = self.mid_y();
        [
            View::new(self.lx, mx, self.ty, my),
            View::new(mx, self.rx, self.ty, my),
            View::new(self.lx, mx, my, self.by),
            View::new(mx, self.rx, my, self.by),
        ]
    }

    /// Rectilinear decomposition of `self` minus `other`.
    ///
    /// Yields up to four strips: left and right of `other` at full height,
    /// then above and below `other` within the horizontal span the two share.
    /// Strips never share positive area with each other; they may share
    /// edges, with each other and with `other`. Returns an empty list if
    /// `other` covers `self`, and `[self]` if the two do not overlap.
    pub fn subtract(&self, other: &View) -> Vec<View> {
        if self == other {
            return Vec::new();
        }
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut pieces = Vec::with_capacity(4);
        if other.lx > self.lx {
            pieces.push(View::new(self.lx, other.lx, self.ty, self.by));
        }
        if other.rx < self.rx {
            pieces.push(View::new(other.rx, self.rx, self.ty, self.by));
        }
        let lx = self.lx.max(other.lx);
        let rx = self.rx.min(other.rx);
        if other.ty > self.ty {
            pieces.push(View::new(lx, rx, self.ty, other.ty));
        }
        if other.by < self.by {
            pieces.push(View::new(lx, rx, other.by, self.by));
        }
        pieces
    }

    /// Subtract every view in `others` in turn.
    pub fn subtract_all(&self, others: &[View]) -> Vec<View> {
        let mut pieces = vec![*self];
        for other in others {
            if pieces.is_empty() {
                break;
            }
            pieces = pieces.iter().flat_map(|p| p.subtract(other)).collect();
        }
        pieces
    }

    /// The overlapping rectangle, or `None` if the views are disjoint.
    pub fn intersect(&self, other: &View) -> Option<View> {
        if self == other {
            return Some(*self);
        }
        if !self.overlaps(other) {
            return None;
        }
        Some(View::new(
            self.lx.max(other.lx),
            self.rx.min(other.rx),
            self.ty.max(other.ty),
            self.by.min(other.by),
        ))
    }
}

/// Whether any view in `views` contains `(x, y)`.
#[inline]
pub(crate) fn any_contains(views: &[View], x: f64, y: f64) -> bool {
    views.iter().any(|v| v.contains(x, y))
}

/// Whether any view in `views` overlaps `view`.
#[inline]
pub(crate) fn any_overlaps(views: &[View], view: &View) -> bool {
    views.iter().any(|v| v.overlaps(view))
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6} {:.6} {:.6} {:.6}]", self.lx, self.rx, self.ty, self.by)
    }
}
