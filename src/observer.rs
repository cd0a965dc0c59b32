use super::*;

/// Window onto the document, in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub(crate) scroll_y: i64,
    pub(crate) height: i64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_y: 0,
            height: 800,
        }
    }
}

/// Element geometry in document coordinates, set by the test driver.
/// Elements without bounds never intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub(crate) top: i64,
    pub(crate) height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchPurpose {
    SectionView,
    LazyImage,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Watch {
    pub(crate) target: NodeId,
    pub(crate) threshold: f64,
    pub(crate) purpose: WatchPurpose,
    pub(crate) active: bool,
}

/// Visible proportion of the element, 0.0 when disjoint from the viewport.
pub(crate) fn intersection_ratio(viewport: Viewport, bounds: Bounds) -> f64 {
    if bounds.height <= 0 || viewport.height <= 0 {
        return 0.0;
    }
    let view_top = viewport.scroll_y;
    let view_bottom = viewport.scroll_y + viewport.height;
    let top = bounds.top;
    let bottom = bounds.top + bounds.height;
    let overlap = bottom.min(view_bottom) - top.max(view_top);
    if overlap <= 0 {
        return 0.0;
    }
    overlap as f64 / bounds.height as f64
}

impl Page {
    pub(crate) fn observe(&mut self, target: NodeId, threshold: f64, purpose: WatchPurpose) {
        self.watches.push(Watch {
            target,
            threshold,
            purpose,
            active: true,
        });
    }

    fn unobserve(&mut self, target: NodeId, purpose: WatchPurpose) {
        for watch in &mut self.watches {
            if watch.target == target && watch.purpose == purpose {
                watch.active = false;
            }
        }
    }

    /// Runs one notification pass over every active watch. Called after any
    /// viewport or geometry change, and once when enhancement completes.
    pub(crate) fn deliver_intersections(&mut self) -> Result<()> {
        let viewport = self.viewport;
        let due: Vec<(NodeId, WatchPurpose)> = self
            .watches
            .iter()
            .filter(|watch| watch.active)
            .filter_map(|watch| {
                let bounds = self.bounds.get(&watch.target)?;
                let ratio = intersection_ratio(viewport, *bounds);
                let reached = match watch.purpose {
                    WatchPurpose::SectionView => ratio >= watch.threshold,
                    WatchPurpose::LazyImage => ratio > 0.0,
                };
                reached.then_some((watch.target, watch.purpose))
            })
            .collect();

        for (target, purpose) in due {
            match purpose {
                WatchPurpose::SectionView => self.track_section_view(target)?,
                WatchPurpose::LazyImage => {
                    self.activate_lazy_image(target)?;
                    self.unobserve(target, WatchPurpose::LazyImage);
                }
            }
        }
        Ok(())
    }
}
