// Step highlight reporting and the rendering surface seam

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The narrow set of calls the sequencer makes into whatever draws the grid
pub trait RenderSurface {
    /// Mark `step` as current in every row, replacing any previous mark
    fn highlight_step(&mut self, step: usize);

    fn clear_highlight(&mut self);

    fn cell_changed(&mut self, row: usize, step: usize, active: bool);

    /// The pattern was resized or cleared; redraw every cell from `cells`
    fn pattern_reset(&mut self, cells: &[Vec<bool>]) {
        for (row, steps) in cells.iter().enumerate() {
            for (step, &active) in steps.iter().enumerate() {
                self.cell_changed(row, step, active);
            }
        }
    }
}

/// Stateless projection of the cursor onto a render surface
pub struct StepHighlightReporter {
    surface: Box<dyn RenderSurface + Send>,
}

impl StepHighlightReporter {
    pub fn new(surface: Box<dyn RenderSurface + Send>) -> Self {
        Self { surface }
    }

    pub fn report(&mut self, step: usize) {
        self.surface.highlight_step(step);
    }

    pub fn clear(&mut self) {
        self.surface.clear_highlight();
    }

    pub fn cell_changed(&mut self, row: usize, step: usize, active: bool) {
        self.surface.cell_changed(row, step, active);
    }

    pub fn pattern_reset(&mut self, cells: &[Vec<bool>]) {
        self.surface.pattern_reset(cells);
    }
}

/// In-memory mirror of what a renderer shows: cell states plus the highlighted column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridView {
    cells: Vec<Vec<bool>>,
    current_step: Option<usize>,
}

impl GridView {
    pub fn new(rows: usize, steps: usize) -> Self {
        Self {
            cells: vec![vec![false; steps]; rows],
            current_step: None,
        }
    }

    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn is_highlighted(&self, row: usize, step: usize) -> bool {
        row < self.cells.len() && self.current_step == Some(step)
    }

    pub fn is_active(&self, row: usize, step: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|steps| steps.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn steps(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }
}

impl RenderSurface for GridView {
    fn highlight_step(&mut self, step: usize) {
        self.current_step = Some(step);
    }

    fn clear_highlight(&mut self) {
        self.current_step = None;
    }

    fn cell_changed(&mut self, row: usize, step: usize, active: bool) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|steps| steps.get_mut(step)) {
            *cell = active;
        }
    }

    fn pattern_reset(&mut self, cells: &[Vec<bool>]) {
        self.cells = cells.to_vec();
        if let Some(step) = self.current_step {
            if step >= self.steps() {
                self.current_step = None;
            }
        }
    }
}

/// A GridView shared between the dispatch thread and a renderer
#[derive(Debug, Clone, Default)]
pub struct SharedGridView(Arc<Mutex<GridView>>);

impl SharedGridView {
    pub fn new(rows: usize, steps: usize) -> Self {
        Self(Arc::new(Mutex::new(GridView::new(rows, steps))))
    }

    pub fn lock(&self) -> MutexGuard<'_, GridView> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> GridView {
        self.lock().clone()
    }
}

impl RenderSurface for SharedGridView {
    fn highlight_step(&mut self, step: usize) {
        self.lock().highlight_step(step);
    }

    fn clear_highlight(&mut self) {
        self.lock().clear_highlight();
    }

    fn cell_changed(&mut self, row: usize, step: usize, active: bool) {
        self.lock().cell_changed(row, step, active);
    }

    fn pattern_reset(&mut self, cells: &[Vec<bool>]) {
        self.lock().pattern_reset(cells);
    }
}
