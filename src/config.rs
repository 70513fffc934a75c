//! Fan-out configuration for the R*-tree.

use thiserror::Error;

const DEFAULT_MAX_CHILDREN: usize = 8;
const DEFAULT_MIN_CHILDREN: usize = 3;

/// Rejected [`IndexConfig`] parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Nodes must be allowed at least two children.
    #[error("min_children must be at least 2, got {0}")]
    MinChildrenTooSmall(usize),

    /// A split of an overfull node must leave both halves at least `min_children` entries.
    #[error("max_children {max} cannot be split into two nodes of at least {min}")]
    MaxChildrenTooSmall {
        /// Requested maximum fan-out.
        max: usize,
        /// Requested minimum fan-out.
        min: usize,
    },
}

/// Minimum and maximum number of children per tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexConfig {
    max_children: usize,
    min_children: usize,
}

impl IndexConfig {
    /// Validates and creates a configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `min_children < 2` or an overfull node of
    /// `max_children + 1` entries cannot be split into two halves of at least
    /// `min_children`.
    ///
    /// # Example
    /// ```
    /// use claimbox::config::IndexConfig;
    /// assert!(IndexConfig::new(16, 6).is_ok());
    /// assert!(IndexConfig::new(4, 3).is_err());
    /// ```
    pub fn new(max_children: usize, min_children: usize) -> Result<Self, ConfigError> {
        if min_children < 2 {
            return Err(ConfigError::MinChildrenTooSmall(min_children));
        }
        if 2 * min_children > max_children + 1 {
            return Err(ConfigError::MaxChildrenTooSmall {
                max: max_children,
                min: min_children,
            });
        }
        Ok(Self {
            max_children,
            min_children,
        })
    }

    /// Maximum children before a node is split.
    pub const fn max_children(&self) -> usize {
        self.max_children
    }

    /// Minimum children below which a non-root node is dissolved.
    pub const fn min_children(&self) -> usize {
        self.min_children
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            min_children: DEFAULT_MIN_CHILDREN,
        }
    }
}
