pub mod sampler;

pub use sampler::{GoNoGoSampler, SamplerConfig};
