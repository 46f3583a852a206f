pub mod generate;
pub mod model;

pub use generate::ChartGenerator;
pub use model::{Chart, ChartError, Note};
