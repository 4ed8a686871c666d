use crate::error::IndexGeneratorError;

/// Maximum allowed index (inclusive).
pub const MAX_INDEX: i64 = (1 << 31) - 1;

/// Sequential index generator.
///
/// Yields `initial, initial + 1, ..., max, min, min + 1, ...` forever.
#[derive(Debug, Clone)]
pub struct IndexGenerator {
    min: i64,
    max: i64,
    next: i64,
}

impl IndexGenerator {
    pub fn new(min: i64, max: i64, initial: Option<i64>) -> Result<Self, IndexGeneratorError> {
        if max <= min {
            return Err(IndexGeneratorError::EmptyRange { min, max });
        }
        let initial = initial.unwrap_or(min);
        if !(min..=max).contains(&initial) {
            return Err(IndexGeneratorError::InitialOutOfRange { initial, min, max });
        }

        Ok(Self {
            min,
            max,
            next: initial,
        })
    }
}

impl Default for IndexGenerator {
    fn default() -> Self {
        Self {
            min: 1,
            max: MAX_INDEX,
            next: 1,
        }
    }
}

impl Iterator for IndexGenerator {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let index = self.next;
        self.next = if index >= self.max { self.min } else { index + 1 };
        Some(index)
    }
}
