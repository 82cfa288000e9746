use std::{error::Error, fmt};

/// Flat, fixed-size array of signed cells addressed from zero.
///
/// Every access is bounds checked. Nothing here panics on a bad address; the failure is
/// returned to the caller and memory is left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    data: Vec<i32>,
}

/// Error accessing a memory cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryError {
    OutOfBounds { index: i32, size: usize },
}

impl Error for MemoryError {}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfBounds { index, size } => {
                write!(f, "Address {} is outside of memory (size {})", index, size)
            }
        }
    }
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Memory {
            data: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Grow or shrink memory. New cells are zeroed, surviving cells keep their value.
    ///
    /// Not meant to be called while a program is running.
    pub fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    pub fn is_valid(&self, index: i32) -> bool {
        usize::try_from(index).is_ok_and(|index| index < self.data.len())
    }

    fn slot(&self, index: i32) -> Result<usize, MemoryError> {
        if self.is_valid(index) {
            Ok(index as usize)
        } else {
            Err(MemoryError::OutOfBounds {
                index,
                size: self.data.len(),
            })
        }
    }

    pub fn get(&self, index: i32) -> Result<i32, MemoryError> {
        let slot = self.slot(index)?;
        Ok(self.data[slot])
    }

    pub fn set(&mut self, index: i32, value: i32) -> Result<(), MemoryError> {
        let slot = self.slot(index)?;
        self.data[slot] = value;
        Ok(())
    }

    /// Read the cell whose address is stored at `index`.
    pub fn get_indirect(&self, index: i32) -> Result<i32, MemoryError> {
        let target = self.get(index)?;
        self.get(target)
    }

    /// Write to the cell whose address is stored at `index`.
    pub fn set_indirect(&mut self, index: i32, value: i32) -> Result<(), MemoryError> {
        let target = self.get(index)?;
        self.set(target, value)
    }

    pub fn all(&self) -> &[i32] {
        &self.data
    }

    /// Zero every cell. Size is unchanged.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        let mut memory = Memory::new(16);
        assert!(memory.get(-1).is_err());
        assert!(memory.get(16).is_err());
        assert!(memory.set(-1, 101).is_err());
        assert_eq!(
            memory.set(16, 101),
            Err(MemoryError::OutOfBounds {
                index: 16,
                size: 16
            })
        );
        assert!(memory.all().iter().all(|&cell| cell == 0));
    }

    #[test]
    fn set_get() {
        let mut memory = Memory::new(16);
        for (index, value) in [(0, 101), (1, -7), (15, i32::MAX), (7, i32::MIN)] {
            memory.set(index, value).unwrap();
            assert_eq!(memory.get(index), Ok(value));
        }
    }

    #[test]
    fn set_get_indirect() {
        let mut memory = Memory::new(16);
        memory.set(1, 8).unwrap();
        memory.set_indirect(1, 101).unwrap();
        assert_eq!(memory.get_indirect(1), Ok(101));
        assert_eq!(memory.get(8), Ok(101));
    }

    #[test]
    fn indirect_bounds() {
        let mut memory = Memory::new(16);
        memory.set(1, -1).unwrap();
        memory.set(2, 16).unwrap();
        let before = memory.clone();

        assert!(memory.set_indirect(1, 101).is_err());
        assert!(memory.set_indirect(2, 101).is_err());
        assert!(memory.set_indirect(20, 101).is_err());
        assert!(memory.get_indirect(1).is_err());
        assert!(memory.get_indirect(2).is_err());
        assert_eq!(memory, before);
    }

    #[test]
    fn reset_keeps_size() {
        let mut memory = Memory::new(4);
        memory.set(3, 9).unwrap();
        memory.reset();
        assert_eq!(memory.all(), &[0, 0, 0, 0]);
        assert_eq!(memory.size(), 4);
    }

    #[test]
    fn resize() {
        let mut memory = Memory::new(2);
        memory.set(1, 5).unwrap();
        memory.set_size(4);
        assert_eq!(memory.all(), &[0, 5, 0, 0]);
        memory.set_size(1);
        assert!(!memory.is_valid(1));
        assert!(memory.is_valid(0));
    }
}
