//! Errors returned when reading from or writing to a bit stream

pub type Result<T> = core::result::Result<T, SerializationError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("not enough bits left in the buffer: requested {requested}, remaining {remaining}")]
    NotEnoughBits { requested: usize, remaining: usize },
    #[error("value {value} does not fit in {bits} bits")]
    Overflow { value: u64, bits: u32 },
    #[error("invalid value read for {0}")]
    InvalidValue(&'static str),
}
