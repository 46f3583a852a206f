pub mod decode;
pub mod features;
pub mod onset;
pub mod spectrum;
