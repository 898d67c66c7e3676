mod strategy_selector;

pub use strategy_selector::StrategySelector;
