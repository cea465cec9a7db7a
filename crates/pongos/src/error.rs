//! Error types

use thiserror::Error;

/// Arena allocator failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena exhausted: no free block can hold {requested} bytes")]
    Exhausted { requested: usize },

    #[error("arena storage of {len} bytes cannot hold a single block")]
    TooSmall { len: usize },

    #[error("no live block at offset {offset:#x}")]
    InvalidBlock { offset: usize },
}

impl ArenaError {
    pub fn exhausted(requested: usize) -> Self {
        Self::Exhausted { requested }
    }

    pub fn invalid_block(offset: usize) -> Self {
        Self::InvalidBlock { offset }
    }
}

/// Kernel bring-up failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),
}

pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kernel_error_names_the_arena_failure() {
        let too_small = KernelError::from(ArenaError::TooSmall { len: 8 });
        assert_eq!(too_small.to_string(), "arena error: arena storage of 8 bytes cannot hold a single block");

        let exhausted = KernelError::from(ArenaError::exhausted(4000));
        assert_eq!(exhausted.to_string(), "arena error: arena exhausted: no free block can hold 4000 bytes");
    }
}
