// Pattern store: the instrument x step activation matrix

use grid_core::{Result, SequencerError};

/// Boolean activation matrix, indexed [instrument][step]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStore {
    cells: Vec<Vec<bool>>,
    steps: usize,
}

impl PatternStore {
    /// Create an all-inactive pattern
    pub fn new(rows: usize, steps: usize) -> Result<Self> {
        if steps == 0 {
            return Err(SequencerError::InvalidStepCount(steps));
        }
        if rows == 0 {
            return Err(SequencerError::InvalidPattern("pattern cannot be empty"));
        }
        Ok(Self {
            cells: vec![vec![false; steps]; rows],
            steps,
        })
    }

    /// Build a store from preset rows after checking they form a rectangle
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self> {
        Self::validate_pattern(&rows)?;
        let steps = rows[0].len();
        Ok(Self { cells: rows, steps })
    }

    /// Validate that the pattern is consistent and usable
    pub fn validate_pattern(pattern: &[Vec<bool>]) -> Result<()> {
        if pattern.is_empty() {
            return Err(SequencerError::InvalidPattern("pattern cannot be empty"));
        }

        if pattern.iter().any(|row| row.is_empty()) {
            return Err(SequencerError::InvalidPattern("pattern cannot have empty rows"));
        }

        let first_len = pattern[0].len();
        if pattern.iter().skip(1).any(|row| row.len() != first_len) {
            return Err(SequencerError::InvalidPattern("all rows must have the same length"));
        }

        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn check(&self, row: usize, step: usize) -> Result<()> {
        if row < self.rows() && step < self.steps {
            Ok(())
        } else {
            Err(SequencerError::InvalidIndex {
                row,
                step,
                rows: self.rows(),
                steps: self.steps,
            })
        }
    }

    /// Flip a cell and return its new value
    pub fn toggle(&mut self, row: usize, step: usize) -> Result<bool> {
        self.check(row, step)?;
        let cell = &mut self.cells[row][step];
        *cell = !*cell;
        Ok(*cell)
    }

    pub fn is_active(&self, row: usize, step: usize) -> Result<bool> {
        self.check(row, step)?;
        Ok(self.cells[row][step])
    }

    /// Read one column across every row as (row, active) pairs
    pub fn column_snapshot(&self, step: usize) -> Result<Vec<(usize, bool)>> {
        if step >= self.steps {
            return Err(SequencerError::InvalidStep {
                step,
                steps: self.steps,
            });
        }
        Ok(self
            .cells
            .iter()
            .enumerate()
            .map(|(row, cells)| (row, cells[step]))
            .collect())
    }

    /// Change the step count. Overlapping cells survive, new cells start inactive.
    pub fn resize_steps(&mut self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Err(SequencerError::InvalidStepCount(steps));
        }
        for row in &mut self.cells {
            row.resize(steps, false);
        }
        self.steps = steps;
        Ok(())
    }

    pub fn clear(&mut self) {
        for row in &mut self.cells {
            row.iter_mut().for_each(|cell| *cell = false);
        }
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|&&cell| cell).count()
    }

    pub fn as_rows(&self) -> &[Vec<bool>] {
        &self.cells
    }
}
