pub mod agents;
pub mod audit;
pub mod egress;
pub mod invoke;
