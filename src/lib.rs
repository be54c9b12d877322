pub mod arbitrage_engine;
pub mod match_fetcher;
pub mod normalization;
pub mod odds_fetcher;
pub mod pipeline;
pub mod renderer;
pub mod shared_types;
