//! Grid expansion: one watermark placement into one or many anchors

use crate::coords::{PagePoint, PageSize};
use crate::error::{Error, Result};
use crate::model::{GridSettings, Watermark};
use tracing::warn;

/// Largest number of anchors one watermark may expand to on one page
pub const MAX_ANCHORS: u64 = 1_000_000;

/// Lazy iterator over the anchors of one watermark on one page
///
/// Finite and cheap to clone; clone before consuming to walk the same
/// anchors twice.
#[derive(Debug, Clone)]
pub struct Anchors {
    inner: AnchorsInner,
}

#[derive(Debug, Clone)]
enum AnchorsInner {
    Single(Option<PagePoint>),
    Lattice {
        gap_x: f64,
        gap_y: f64,
        columns: u64,
        total: u64,
        next: u64,
    },
}

impl Iterator for Anchors {
    type Item = PagePoint;

    fn next(&mut self) -> Option<PagePoint> {
        match &mut self.inner {
            AnchorsInner::Single(anchor) => anchor.take(),
            AnchorsInner::Lattice {
                gap_x,
                gap_y,
                columns,
                total,
                next,
            } => {
                if *next >= *total {
                    return None;
                }
                let column = *next % *columns;
                let row = *next / *columns;
                *next += 1;
                Some(PagePoint::new(column as f64 * *gap_x, row as f64 * *gap_y))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.inner {
            AnchorsInner::Single(anchor) => anchor.is_some() as usize,
            AnchorsInner::Lattice { total, next, .. } => total.saturating_sub(*next) as usize,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Anchors {}

/// Expand a stored position into anchors
///
/// With the grid disabled this yields exactly `position`. With it enabled it
/// yields the lattice `{0, gap_x, …} × {0, gap_y, …}`, each axis running up
/// to and including the first multiple that reaches the page edge, so the far
/// edge is always covered. Instances near the edge bleed past the page.
///
/// Fails with [`Error::InvalidConfiguration`] for a non-positive or
/// non-finite gap, or when the lattice would exceed [`MAX_ANCHORS`];
/// callers should disable the grid rather than retry.
pub fn expand(grid: &GridSettings, page: PageSize, position: PagePoint) -> Result<Anchors> {
    if !grid.enabled {
        return Ok(Anchors {
            inner: AnchorsInner::Single(Some(position)),
        });
    }

    let columns = steps_to_cover(page.width, grid.gap_x, "gap_x")?;
    let rows = steps_to_cover(page.height, grid.gap_y, "gap_y")?;
    let total = columns
        .checked_mul(rows)
        .filter(|&n| n <= MAX_ANCHORS)
        .ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "grid of {} x {} anchors exceeds {}",
                columns, rows, MAX_ANCHORS
            ))
        })?;
    Ok(Anchors {
        inner: AnchorsInner::Lattice {
            gap_x: grid.gap_x,
            gap_y: grid.gap_y,
            columns,
            total,
            next: 0,
        },
    })
}

/// Anchors for a watermark on a page of the given size
pub fn anchors_for(watermark: &Watermark, page: PageSize) -> Result<Anchors> {
    expand(&watermark.grid, page, watermark.position)
}

/// Anchors for a watermark, drawing it once at its position when the grid
/// cannot be expanded on this page
pub fn anchors_or_single(watermark: &Watermark, page: PageSize) -> Anchors {
    anchors_for(watermark, page).unwrap_or_else(|e| {
        warn!(id = watermark.id().get(), error = %e, "grid ignored on this page");
        Anchors {
            inner: AnchorsInner::Single(Some(watermark.position)),
        }
    })
}

/// Number of lattice positions on `[0, extent]`: `0, gap, …, k·gap` with `k·gap ≥ extent`
fn steps_to_cover(extent: f64, gap: f64, name: &str) -> Result<u64> {
    if !gap.is_finite() || gap <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "grid {} must be positive, got {}",
            name, gap
        )));
    }
    if !extent.is_finite() || extent <= 0.0 {
        return Ok(1);
    }
    Ok(((extent / gap).ceil() as u64).saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(gap_x: f64, gap_y: f64) -> GridSettings {
        GridSettings {
            enabled: true,
            gap_x,
            gap_y,
        }
    }

    #[test]
    fn test_disabled_yields_stored_position() {
        let position = PagePoint::new(123.0, 45.0);
        let anchors: Vec<PagePoint> =
            expand(&GridSettings::default(), PageSize::new(500.0, 300.0), position)
                .unwrap()
                .collect();
        assert_eq!(anchors, vec![position]);
    }

    #[test]
    fn test_lattice_covers_far_edge() {
        let anchors: Vec<PagePoint> =
            expand(&grid(100.0, 100.0), PageSize::new(500.0, 300.0), PagePoint::default())
                .unwrap()
                .collect();

        assert_eq!(anchors.len(), 24);
        let xs: Vec<f64> = anchors.iter().filter(|p| p.y == 0.0).map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 100.0, 200.0, 300.0, 400.0, 500.0]);
        let ys: Vec<f64> = anchors.iter().filter(|p| p.x == 0.0).map(|p| p.y).collect();
        assert_eq!(ys, vec![0.0, 100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_inexact_multiple_overshoots_edge() {
        let anchors: Vec<PagePoint> =
            expand(&grid(150.0, 1000.0), PageSize::new(500.0, 300.0), PagePoint::default())
                .unwrap()
                .collect();

        // x: 0, 150, 300, 450, 600; y: 0, 1000
        assert_eq!(anchors.len(), 10);
        assert!(anchors.iter().any(|p| p.x == 600.0));
        assert!(anchors.iter().any(|p| p.y == 1000.0));
    }

    #[test]
    fn test_invalid_gaps_fail_fast() {
        let page = PageSize::new(500.0, 300.0);
        for (gx, gy) in [(0.0, 10.0), (10.0, -1.0), (f64::NAN, 10.0), (10.0, f64::INFINITY)] {
            let result = expand(&grid(gx, gy), page, PagePoint::default());
            assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn test_tiny_gap_is_rejected_instead_of_overflowing() {
        let page = PageSize::new(612.0, 792.0);
        for gap in [1e-300, 1e-3] {
            let result = expand(&grid(gap, gap), page, PagePoint::default());
            assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        }

        // A one point grid on a letter page still fits
        let anchors = expand(&grid(1.0, 1.0), page, PagePoint::default()).unwrap();
        assert_eq!(anchors.len(), 613 * 793);
    }

    #[test]
    fn test_oversized_grid_falls_back_to_one_anchor() {
        let mut set = crate::model::WatermarkSet::new();
        let id = set.add_text("X", PageSize::new(612.0, 792.0));
        set.update_properties(
            id,
            crate::model::WatermarkUpdate {
                grid_enabled: Some(true),
                gap_x: Some(1.0),
                gap_y: Some(1.0),
                ..Default::default()
            },
        );
        let watermark = set.get(id).unwrap();

        let huge = PageSize::new(14400.0, 14400.0);
        let anchors: Vec<PagePoint> = anchors_or_single(watermark, huge).collect();
        assert_eq!(anchors, vec![watermark.position]);

        let letter = PageSize::new(612.0, 792.0);
        assert_eq!(anchors_or_single(watermark, letter).len(), 613 * 793);
    }

    #[test]
    fn test_clone_restarts_from_same_point() {
        let anchors =
            expand(&grid(100.0, 100.0), PageSize::new(200.0, 100.0), PagePoint::default()).unwrap();
        assert_eq!(anchors.len(), 6);

        let first: Vec<PagePoint> = anchors.clone().collect();
        let second: Vec<PagePoint> = anchors.collect();
        assert_eq!(first, second);
    }
}
