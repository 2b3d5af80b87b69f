use std::sync::Arc;

use super::{GeometryError, LedMatrices, ScreenSize, ToLedMatrix};
use crate::models::LedLayout;

/// Keeps the last computed matrices until the layout or the screen size change
#[derive(Debug, Default)]
pub struct GeometryCache {
    entry: Option<(LedLayout, ScreenSize, Arc<LedMatrices>)>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        layout: &LedLayout,
        screen: ScreenSize,
    ) -> Result<Arc<LedMatrices>, GeometryError> {
        if let Some((cached_layout, cached_screen, matrices)) = &self.entry {
            if cached_layout == layout && *cached_screen == screen {
                return Ok(matrices.clone());
            }
        }

        debug!(%screen, leds = layout.total(), "computing LED geometry");

        let matrices = Arc::new(layout.to_matrices(screen)?);
        self.entry = Some((layout.clone(), screen, matrices.clone()));
        Ok(matrices)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
