use std::collections::BTreeMap;
use std::fmt;

use mm_core::{MatmulError, MultiplyStrategy, NaiveStrategy, Result};
use tracing::warn;

use crate::config::EngineConfig;
use crate::fork_join::ForkJoinStrategy;
use crate::parallel_rows::ParallelRowsSimdStrategy;
use crate::per_cell::PerCellStrategy;
use crate::per_row::PerRowStrategy;
use crate::pipeline::PipelineStrategy;
use crate::row_ranges::RowRangeStrategy;
use crate::row_stealing::RowStealingStrategy;
use crate::tiled::TiledForkJoinStrategy;
use crate::transpose::TransposeStrategy;

/// Builds one strategy from the shared configuration.
pub type Factory = fn(&EngineConfig) -> Result<Box<dyn MultiplyStrategy>>;

/// Named strategy factories.
///
/// [`Registry::instantiate`] returns strategies sorted by their own
/// [`MultiplyStrategy::name`], whatever key they were registered under.
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<&'static str, Factory>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Every strategy in the engine.
    pub fn builtin() -> Self {
        Self::new()
            .with("naive", |_| Ok(Box::new(NaiveStrategy::new())))
            .with("transpose", |cfg| {
                Ok(Box::new(TransposeStrategy::new().with_validation(cfg.validation)))
            })
            .with("transpose-simd", |cfg| {
                Ok(Box::new(TransposeStrategy::simd().with_validation(cfg.validation)))
            })
            .with("per-cell", |cfg| {
                Ok(Box::new(PerCellStrategy::new().with_validation(cfg.validation)))
            })
            .with("per-row", |cfg| {
                Ok(Box::new(PerRowStrategy::new().with_validation(cfg.validation)))
            })
            .with("row-stealing", |cfg| {
                Ok(Box::new(RowStealingStrategy::from_config(cfg)))
            })
            .with("row-ranges-simd", |cfg| {
                Ok(Box::new(RowRangeStrategy::from_config(cfg)?))
            })
            .with("parallel-rows-simd", |cfg| {
                Ok(Box::new(
                    ParallelRowsSimdStrategy::new().with_validation(cfg.validation),
                ))
            })
            .with("fork-join", |cfg| Ok(Box::new(ForkJoinStrategy::from_config(cfg))))
            .with("fork-join-simd-tiled", |cfg| {
                Ok(Box::new(TiledForkJoinStrategy::from_config(cfg)))
            })
            .with("pipeline", |cfg| Ok(Box::new(PipelineStrategy::from_config(cfg))))
    }

    /// Register `factory` under `name`, replacing any previous entry.
    /// Returns self for builder-style usage.
    pub fn with(mut self, name: &'static str, factory: Factory) -> Self {
        self.factories.insert(name, factory);
        self
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build every registered strategy.
    ///
    /// Factories that fail are logged and skipped. If none succeeds the
    /// result is the reference strategy alone, so callers always get at
    /// least one usable strategy.
    pub fn instantiate(&self, config: &EngineConfig) -> Vec<Box<dyn MultiplyStrategy>> {
        let mut strategies: Vec<Box<dyn MultiplyStrategy>> = self
            .factories
            .iter()
            .filter_map(|(name, factory)| match factory(config) {
                Ok(strategy) => Some(strategy),
                Err(e) => {
                    warn!(strategy = *name, error = %e, "skipping strategy");
                    None
                }
            })
            .collect();
        strategies.sort_by(|a, b| a.name().cmp(b.name()));

        if strategies.is_empty() {
            warn!("no strategy could be built, falling back to naive");
            strategies.push(Box::new(NaiveStrategy::new()));
        }
        strategies
    }

    /// Build the strategy registered under `name`.
    ///
    /// # Errors
    /// [`MatmulError::UnknownStrategy`] if nothing is registered under
    /// `name`, otherwise whatever the factory returns.
    pub fn find(&self, name: &str, config: &EngineConfig) -> Result<Box<dyn MultiplyStrategy>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| MatmulError::UnknownStrategy(name.to_string()))?;
        factory(config)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
