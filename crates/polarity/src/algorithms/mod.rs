pub mod threshold;
pub mod morphology;
pub mod segmentation;
pub mod classification;
pub mod hull;

pub use threshold::*;
pub use morphology::*;
pub use segmentation::*;
pub use classification::*;
pub use hull::*;
