use std::fmt;

#[cfg(feature = "clap")]
use clap::ValueEnum;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
pub enum DType {
    // Float16 is not available on accelerate
    #[cfg(not(feature = "accelerate"))]
    Float16,
    #[default]
    Float32,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            #[cfg(not(feature = "accelerate"))]
            DType::Float16 => write!(f, "float16"),
            DType::Float32 => write!(f, "float32"),
        }
    }
}
