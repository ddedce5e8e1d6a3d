pub mod approval;
pub mod boq;
pub mod comparison;
pub mod quote;
