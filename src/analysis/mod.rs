pub mod risk;
pub mod rules;
pub mod trend;
